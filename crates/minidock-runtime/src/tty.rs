//! Pseudo-terminal plumbing for interactive containers.
//!
//! The slave side becomes the container's controlling terminal and stdio;
//! the launcher keeps the master and shuttles bytes between it and its own
//! terminal on two threads.

use std::fs::File;
use std::io::{Read, Write};
use std::os::fd::{AsFd, AsRawFd, OwnedFd, RawFd};
use std::thread::JoinHandle;

use minidock_common::error::{MinidockError, Result};
use nix::fcntl::{FcntlArg, FdFlag, fcntl};
use nix::pty::{OpenptyResult, Winsize, openpty};
use nix::sys::termios::{self, SetArg, Termios};

/// Label used for errors on the pty, which has no stable path.
const PTY_LABEL: &str = "<pty>";

/// An allocated pseudo-terminal pair.
#[derive(Debug)]
pub struct Pty {
    master: OwnedFd,
    slave: OwnedFd,
}

impl Pty {
    /// Allocates a new pseudo-terminal sized like the invoking terminal.
    ///
    /// Both ends are marked close-on-exec; the launched child receives the
    /// slave through `dup2` onto its standard descriptors.
    ///
    /// # Errors
    ///
    /// Returns an error if `openpty(3)` fails.
    pub fn open() -> Result<Self> {
        let size = terminal_size();
        let OpenptyResult { master, slave } =
            openpty(size.as_ref(), None).map_err(|e| MinidockError::io(PTY_LABEL, e.into()))?;
        set_cloexec(&master)?;
        set_cloexec(&slave)?;
        Ok(Self { master, slave })
    }

    /// Raw descriptor of the slave side, for the child's stdio.
    #[must_use]
    pub fn slave_fd(&self) -> RawFd {
        self.slave.as_raw_fd()
    }

    /// Drops the launcher's copy of the slave and returns the master.
    ///
    /// Must happen once the child holds its own copy: the master only sees
    /// end-of-file when every slave descriptor is closed.
    #[must_use]
    pub fn into_master(self) -> OwnedFd {
        self.master
    }
}

/// Bytes flowing between the invoking terminal and a pty master.
#[derive(Debug)]
pub struct PtyForwarder {
    output: JoinHandle<()>,
    _raw_mode: Option<RawModeGuard>,
}

impl PtyForwarder {
    /// Starts copying master → stdout and stdin → master.
    ///
    /// The invoking terminal, if stdin is one, is switched to raw mode so
    /// keystrokes reach the container unprocessed; it is restored when the
    /// forwarder is finished.
    ///
    /// # Errors
    ///
    /// Returns an error if the master cannot be duplicated for the input
    /// thread or a thread cannot be spawned.
    pub fn start(master: OwnedFd) -> Result<Self> {
        let input_fd = master
            .try_clone()
            .map_err(|e| MinidockError::io(PTY_LABEL, e))?;
        let raw_mode = RawModeGuard::enter();

        let output = std::thread::Builder::new()
            .name("pty-output".into())
            .spawn(move || copy_until_closed(File::from(master), std::io::stdout()))
            .map_err(|e| MinidockError::io(PTY_LABEL, e))?;

        // Blocks on stdin for the rest of the process; never joined.
        let _input = std::thread::Builder::new()
            .name("pty-input".into())
            .spawn(move || copy_until_closed(std::io::stdin(), File::from(input_fd)))
            .map_err(|e| MinidockError::io(PTY_LABEL, e))?;

        Ok(Self {
            output,
            _raw_mode: raw_mode,
        })
    }

    /// Waits until the container's output is drained.
    ///
    /// Returns once every slave descriptor is closed, i.e. once the
    /// container's process tree is gone.
    pub fn finish(self) {
        if self.output.join().is_err() {
            tracing::warn!("pty output thread panicked");
        }
    }
}

/// Copies `from` into `to` until end-of-file or the first error.
///
/// A pty master reports `EIO` once the slave is closed, which is the
/// normal way this loop ends.
fn copy_until_closed(mut from: impl Read, mut to: impl Write) {
    let mut buf = [0u8; 4096];
    loop {
        match from.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if to.write_all(&buf[..n]).and_then(|()| to.flush()).is_err() {
                    break;
                }
            }
        }
    }
}

/// Puts stdin in raw mode and restores the saved settings on drop.
#[derive(Debug)]
struct RawModeGuard {
    saved: Termios,
}

impl RawModeGuard {
    /// Returns `None` when stdin is not a terminal.
    fn enter() -> Option<Self> {
        let stdin = std::io::stdin();
        let saved = termios::tcgetattr(stdin.as_fd()).ok()?;
        let mut raw = saved.clone();
        termios::cfmakeraw(&mut raw);
        if let Err(e) = termios::tcsetattr(stdin.as_fd(), SetArg::TCSANOW, &raw) {
            tracing::warn!(error = %e, "cannot switch terminal to raw mode");
            return None;
        }
        Some(Self { saved })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let stdin = std::io::stdin();
        if let Err(e) = termios::tcsetattr(stdin.as_fd(), SetArg::TCSANOW, &self.saved) {
            tracing::warn!(error = %e, "cannot restore terminal settings");
        }
    }
}

/// Window size of the terminal on stdin, if stdin is one.
fn terminal_size() -> Option<Winsize> {
    let mut size = Winsize {
        ws_row: 0,
        ws_col: 0,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };
    // SAFETY: TIOCGWINSZ only writes into `size`.
    let rc = unsafe { libc::ioctl(libc::STDIN_FILENO, libc::TIOCGWINSZ, &mut size) };
    (rc == 0 && size.ws_row > 0).then_some(size)
}

/// Sets `FD_CLOEXEC` on `fd`. It is the only descriptor flag.
fn set_cloexec(fd: impl AsFd) -> Result<()> {
    let _ = fcntl(fd, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))
        .map_err(|e| MinidockError::io(PTY_LABEL, e.into()))?;
    Ok(())
}
