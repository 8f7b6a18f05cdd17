//! Container log management.
//!
//! Only detached containers have a log: their stdout and stderr go to
//! `{registry_root}/{name}/container.log`. Interactive containers write to
//! the invoking terminal and leave nothing behind.

use std::fs::File;
use std::io::ErrorKind;

use minidock_common::error::{MinidockError, Result};

use crate::state::Registry;

/// Creates (or truncates) the log file of `name`.
///
/// The record directory is created first, since the log is opened before
/// the container is launched and recorded.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be created.
pub fn create_log(registry: &Registry, name: &str) -> Result<File> {
    let _ = registry.create_dir(name)?;
    let path = registry.log_path(name);
    let file = File::create(&path).map_err(|e| MinidockError::io(&path, e))?;
    tracing::debug!(path = %path.display(), "container log created");
    Ok(file)
}

/// Reads the log of container `name`.
///
/// Returns an empty string if the container exists but has no log, which is
/// the case for interactive containers.
///
/// # Errors
///
/// Returns [`MinidockError::NotFound`] for an unknown container, or an I/O
/// error if the log exists but cannot be read.
pub fn read_logs(registry: &Registry, name: &str) -> Result<String> {
    if !registry.contains(name) {
        return Err(MinidockError::NotFound {
            kind: "container",
            id: name.to_string(),
        });
    }
    let path = registry.log_path(name);
    match std::fs::read(&path) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(MinidockError::io(&path, e)),
    }
}
