//! The process that runs as PID 1 inside a new container.
//!
//! Started by the launcher as `/proc/self/exe init` with the new root as
//! its working directory. It waits for the user command on the channel,
//! switches the root filesystem, mounts `/proc` and `/dev`, and replaces
//! itself with the user command. It never returns on success.

use std::convert::Infallible;
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use minidock_common::constants::CONTAINER_HOSTNAME;
use minidock_common::error::{MinidockError, Result};
use minidock_core::filesystem::{mount, pivot_root};

use crate::channel::CommandReader;

/// Runs the container init sequence and execs the user command.
///
/// # Errors
///
/// Returns [`MinidockError::Exec`] if the command is empty, cannot be
/// resolved on `PATH`, or `execv(2)` fails. Errors from the root switch are
/// returned as is. Any error is fatal for the container.
pub fn run_container_init() -> Result<Infallible> {
    // SAFETY: this is the only place that adopts the inherited channel and
    // it runs once, in a process started by the launcher.
    let reader = unsafe { CommandReader::inherited() };
    let argv = reader.receive()?;
    let Some(program) = argv.first() else {
        return Err(MinidockError::Exec {
            command: String::new(),
            message: "received an empty command".into(),
        });
    };
    tracing::debug!(command = ?argv, "command received");

    setup_root()?;

    let path = which::which(program).map_err(|e| MinidockError::Exec {
        command: program.clone(),
        message: e.to_string(),
    })?;
    exec(&path, &argv)
}

fn setup_root() -> Result<()> {
    let new_root = std::env::current_dir().map_err(|e| MinidockError::io(".", e))?;
    pivot_root::pivot_root(&new_root)?;
    mount::mount_pseudo_filesystems();
    if let Err(e) = nix::unistd::sethostname(CONTAINER_HOSTNAME) {
        tracing::warn!(error = %e, "cannot set container hostname");
    }
    Ok(())
}

fn exec(path: &Path, argv: &[String]) -> Result<Infallible> {
    let fail = |message: String| MinidockError::Exec {
        command: path.display().to_string(),
        message,
    };
    let program =
        CString::new(path.as_os_str().as_bytes()).map_err(|e| fail(e.to_string()))?;
    let args = to_c_strings(argv).map_err(|e| fail(e.to_string()))?;

    tracing::debug!(path = %path.display(), "exec user command");
    nix::unistd::execv(&program, &args).map_err(|e| fail(e.to_string()))
}

fn to_c_strings(argv: &[String]) -> std::result::Result<Vec<CString>, std::ffi::NulError> {
    argv.iter().map(|arg| CString::new(arg.as_str())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_convert_to_c_strings() {
        let args = to_c_strings(&["echo".into(), "hi".into()]).unwrap();
        assert_eq!(args[1].as_bytes(), b"hi");
        assert!(to_c_strings(&["bad\0arg".into()]).is_err());
    }
}
