//! One-shot command handoff from the launcher to the container init.
//!
//! The launcher writes the user command once, space-joined, and closes its
//! end; init reads until end-of-file. Closing the write end is the only
//! delimiter, so both endpoints are consumed by their single operation.
//! Arguments that themselves contain spaces are split apart on the other
//! side.

use std::fs::File;
use std::io::{Read, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use minidock_common::constants::COMMAND_FD;
use minidock_common::error::{MinidockError, Result};
use nix::fcntl::OFlag;

/// Label used for errors on the pipe, which has no filesystem path.
const PIPE_LABEL: &str = "<command pipe>";

/// Read end, handed to the container init on [`COMMAND_FD`].
#[derive(Debug)]
pub struct CommandReader {
    file: File,
}

/// Write end, kept by the launcher.
#[derive(Debug)]
pub struct CommandWriter {
    file: File,
}

/// Opens a new channel. Both ends are close-on-exec.
///
/// # Errors
///
/// Returns an error if `pipe2(2)` fails.
pub fn channel() -> Result<(CommandReader, CommandWriter)> {
    let (read, write): (OwnedFd, OwnedFd) = nix::unistd::pipe2(OFlag::O_CLOEXEC)
        .map_err(|e| MinidockError::io(PIPE_LABEL, e.into()))?;
    Ok((
        CommandReader {
            file: File::from(read),
        },
        CommandWriter {
            file: File::from(write),
        },
    ))
}

impl CommandWriter {
    /// Sends `argv` and closes the channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails, typically because the reading
    /// process already died.
    pub fn send(mut self, argv: &[String]) -> Result<()> {
        let message = argv.join(" ");
        self.file
            .write_all(message.as_bytes())
            .map_err(|e| MinidockError::io(PIPE_LABEL, e))?;
        tracing::debug!(command = %message, "command sent to init");
        Ok(())
    }
}

impl CommandReader {
    /// Takes ownership of the channel inherited on [`COMMAND_FD`].
    ///
    /// # Safety
    ///
    /// Must be called at most once per process, and only in a process
    /// started by the launcher, where [`COMMAND_FD`] is the open read end.
    pub unsafe fn inherited() -> Self {
        // SAFETY: the caller guarantees COMMAND_FD is an open descriptor
        // nothing else in this process owns.
        let file = unsafe { File::from_raw_fd(COMMAND_FD) };
        Self { file }
    }

    /// Reads to end-of-file and splits the message into arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    pub fn receive(mut self) -> Result<Vec<String>> {
        let mut message = String::new();
        let _ = self
            .file
            .read_to_string(&mut message)
            .map_err(|e| MinidockError::io(PIPE_LABEL, e))?;
        Ok(split_command(&message))
    }
}

impl AsRawFd for CommandReader {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

/// Splits a received message on single spaces, dropping empty pieces.
fn split_command(message: &str) -> Vec<String> {
    message
        .split(' ')
        .filter(|arg| !arg.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argv_survives_the_pipe() {
        let (reader, writer) = channel().unwrap();
        writer
            .send(&["/bin/sh".into(), "-c".into(), "top".into()])
            .unwrap();
        assert_eq!(reader.receive().unwrap(), ["/bin/sh", "-c", "top"]);
    }

    #[test]
    fn arguments_with_spaces_are_split() {
        let (reader, writer) = channel().unwrap();
        writer.send(&["echo".into(), "hello world".into()]).unwrap();
        assert_eq!(reader.receive().unwrap(), ["echo", "hello", "world"]);
    }

    #[test]
    fn closed_without_message_yields_empty_command() {
        let (reader, writer) = channel().unwrap();
        drop(writer);
        assert!(reader.receive().unwrap().is_empty());
    }

    #[test]
    fn both_ends_are_close_on_exec() {
        let (reader, writer) = channel().unwrap();
        for fd in [reader.file.as_raw_fd(), writer.file.as_raw_fd()] {
            // SAFETY: fd is open for the duration of the loop.
            let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
            assert_ne!(flags & libc::FD_CLOEXEC, 0);
        }
    }

    #[test]
    fn split_drops_repeated_spaces() {
        assert_eq!(split_command("ls  -l "), ["ls", "-l"]);
        assert!(split_command("").is_empty());
    }
}
