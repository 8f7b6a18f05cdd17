//! Launching the container init process in fresh namespaces.
//!
//! The launcher clones a child into new UTS, PID, mount, network and IPC
//! namespaces. The child wires up its stdio, places the command channel on
//! [`COMMAND_FD`], and re-executes the current binary as `init`, which then
//! blocks on the channel until the launcher sends the user command.

use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use minidock_common::constants::{COMMAND_FD, INIT_COMMAND};
use minidock_common::error::{MinidockError, Result};
use minidock_core::namespace::NamespaceConfig;
use nix::sys::wait::WaitStatus;
use nix::unistd::Pid;

use crate::channel::CommandReader;
use crate::tty::Pty;

/// Path the child re-executes: always the running binary.
const SELF_EXE: &str = "/proc/self/exe";

/// Stack handed to the cloned child until it execs.
const CHILD_STACK_SIZE: usize = 1024 * 1024;

/// Exit code of a child that could not exec `init`.
const EXEC_FAILED: isize = 127;

/// How the container's standard streams are connected.
#[derive(Debug)]
pub enum ContainerIo {
    /// A pseudo-terminal; the slave becomes stdio and controlling terminal.
    Interactive(Pty),
    /// stdout and stderr go to the log file, stdin reads `/dev/null`.
    Detached(File),
}

/// Everything needed to start one container init process.
#[derive(Debug)]
pub struct LaunchRequest<'a> {
    /// Working directory of the child; the future container root.
    pub rootfs: &'a Path,
    /// Namespaces to create.
    pub namespaces: NamespaceConfig,
    /// Standard stream wiring.
    pub io: &'a ContainerIo,
}

/// Clones the container init process and returns its host PID.
///
/// `reader` is consumed: after this call the only copy of the read end
/// lives in the child.
///
/// # Errors
///
/// Returns an error if the child's arguments cannot be prepared, a stdio
/// file cannot be opened, or `clone(2)` fails (usually missing privileges).
pub fn launch(request: &LaunchRequest<'_>, reader: CommandReader) -> Result<Pid> {
    let exe = c_string(SELF_EXE)?;
    let argv = [exe.clone(), c_string(INIT_COMMAND)?];
    let rootfs = CString::new(request.rootfs.as_os_str().as_bytes()).map_err(|_| {
        MinidockError::Config {
            message: format!("rootfs path {} contains a NUL byte", request.rootfs.display()),
        }
    })?;

    let mut dev_null: Option<OwnedFd> = None;
    let stdio = match request.io {
        ContainerIo::Interactive(pty) => ChildStdio::terminal(pty.slave_fd()),
        ContainerIo::Detached(log) => {
            let null = OpenOptions::new()
                .read(true)
                .open("/dev/null")
                .map_err(|e| MinidockError::io("/dev/null", e))?;
            let stdio = ChildStdio {
                stdin: null.as_raw_fd(),
                stdout: log.as_raw_fd(),
                stderr: log.as_raw_fd(),
                controlling_terminal: false,
            };
            dev_null = Some(OwnedFd::from(null));
            stdio
        }
    };
    let channel_fd = reader.as_raw_fd();

    let mut stack = vec![0u8; CHILD_STACK_SIZE];
    let flags = request.namespaces.clone_flags();
    let child = Box::new(|| {
        // SAFETY: runs in the freshly cloned child, which owns copies of
        // every descriptor referenced here and only execs or exits.
        unsafe { child_main(&stdio, channel_fd, &rootfs, &exe, &argv) }
    });

    // SAFETY: the callback only performs async-signal-safe libc calls and
    // never returns into the parent's stack frames.
    let pid = unsafe { nix::sched::clone(child, &mut stack, flags, Some(libc::SIGCHLD)) }
        .map_err(|e| MinidockError::PermissionDenied {
            message: format!("clone with {flags:?} failed: {e}"),
        })?;

    drop(reader);
    drop(dev_null);
    tracing::info!(
        pid = pid.as_raw(),
        rootfs = %request.rootfs.display(),
        "container init launched"
    );
    Ok(pid)
}

/// Blocks until `pid` exits and returns a shell-style exit code.
///
/// A process killed by a signal reports `128 + signal`.
///
/// # Errors
///
/// Returns an error if `waitpid(2)` fails.
pub fn wait(pid: Pid) -> Result<i32> {
    loop {
        let status = nix::sys::wait::waitpid(pid, None).map_err(|e| {
            MinidockError::PermissionDenied {
                message: format!("waitpid {pid} failed: {e}"),
            }
        })?;
        match status {
            WaitStatus::Exited(_, code) => return Ok(code),
            WaitStatus::Signaled(_, signal, _) => return Ok(128 + signal as i32),
            _ => {}
        }
    }
}

/// Descriptor numbers the child installs as 0, 1 and 2.
#[derive(Debug, Clone, Copy)]
struct ChildStdio {
    stdin: RawFd,
    stdout: RawFd,
    stderr: RawFd,
    controlling_terminal: bool,
}

impl ChildStdio {
    const fn terminal(slave: RawFd) -> Self {
        Self {
            stdin: slave,
            stdout: slave,
            stderr: slave,
            controlling_terminal: true,
        }
    }
}

/// Body of the cloned child. Only returns if something failed.
unsafe fn child_main(
    stdio: &ChildStdio,
    channel_fd: RawFd,
    rootfs: &CString,
    exe: &CString,
    argv: &[CString; 2],
) -> isize {
    // SAFETY: plain syscalls on descriptors and strings owned by the child.
    unsafe {
        let _ = libc::setsid();
        if stdio.controlling_terminal {
            let _ = libc::ioctl(stdio.stdin, libc::TIOCSCTTY, 0);
        }
        if libc::dup2(stdio.stdin, libc::STDIN_FILENO) < 0
            || libc::dup2(stdio.stdout, libc::STDOUT_FILENO) < 0
            || libc::dup2(stdio.stderr, libc::STDERR_FILENO) < 0
        {
            return EXEC_FAILED;
        }

        // dup2 onto itself keeps FD_CLOEXEC, so clear it explicitly.
        if channel_fd == COMMAND_FD {
            let flags = libc::fcntl(COMMAND_FD, libc::F_GETFD);
            if flags < 0 || libc::fcntl(COMMAND_FD, libc::F_SETFD, flags & !libc::FD_CLOEXEC) < 0 {
                return EXEC_FAILED;
            }
        } else if libc::dup2(channel_fd, COMMAND_FD) < 0 {
            return EXEC_FAILED;
        }

        if libc::chdir(rootfs.as_ptr()) < 0 {
            return EXEC_FAILED;
        }

        let args = [argv[0].as_ptr(), argv[1].as_ptr(), std::ptr::null()];
        let _ = libc::execv(exe.as_ptr(), args.as_ptr());
    }
    EXEC_FAILED
}

fn c_string(value: &str) -> Result<CString> {
    CString::new(value).map_err(|_| MinidockError::Config {
        message: format!("{value:?} contains a NUL byte"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_stdio_uses_slave_everywhere() {
        let stdio = ChildStdio::terminal(9);
        assert_eq!((stdio.stdin, stdio.stdout, stdio.stderr), (9, 9, 9));
        assert!(stdio.controlling_terminal);
    }

    #[test]
    fn wait_reports_exit_code_and_signals() {
        let child = std::process::Command::new("sh")
            .args(["-c", "exit 7"])
            .spawn()
            .unwrap();
        let pid = Pid::from_raw(i32::try_from(child.id()).unwrap());
        assert_eq!(wait(pid).unwrap(), 7);

        let child = std::process::Command::new("sh")
            .args(["-c", "kill -TERM $$"])
            .spawn()
            .unwrap();
        let pid = Pid::from_raw(i32::try_from(child.id()).unwrap());
        assert_eq!(wait(pid).unwrap(), 128 + libc::SIGTERM);
    }
}
