//! Namespace joining for executing commands in running containers.
//!
//! The PID namespace is joined by the calling process, which only affects
//! the children it forks afterwards; the remaining namespaces are joined by
//! the forked child right before `exec`, with the mount namespace last.

use std::io::ErrorKind;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::Command;

use minidock_common::error::{MinidockError, Result};
use minidock_core::namespace::Namespace;
use minidock_core::namespace::join::{self, NamespaceHandle};

/// Runs `command` inside the namespaces of process `pid`.
///
/// Standard streams are inherited. The environment is the caller's, plus
/// the variables of the container process (which win on conflict).
/// Returns the command's exit code, or `128 + signal` if it was killed.
///
/// # Errors
///
/// Returns an error if `command` is empty, the namespaces of `pid` cannot
/// be opened or joined, or the command cannot be started.
pub fn exec_in_container(pid: u32, command: &[String]) -> Result<i32> {
    let Some((program, args)) = command.split_first() else {
        return Err(MinidockError::Config {
            message: "exec command is empty".into(),
        });
    };
    tracing::info!(pid, cmd = ?command, "exec into container");

    let (pid_ns, late): (Vec<NamespaceHandle>, Vec<NamespaceHandle>) = join::open_all(pid)?
        .into_iter()
        .partition(|h| h.kind() == Namespace::Pid);
    let environment = read_environ(pid)?;

    for handle in &pid_ns {
        handle.enter().map_err(|e| MinidockError::PermissionDenied {
            message: format!("joining pid namespace of {pid} failed: {e}"),
        })?;
    }

    let mut cmd = Command::new(program);
    let _ = cmd.args(args).envs(environment);
    // SAFETY: the hook only issues setns(2) on descriptors opened above,
    // which is async-signal-safe.
    let _ = unsafe {
        cmd.pre_exec(move || {
            for handle in &late {
                handle.enter().map_err(std::io::Error::from)?;
            }
            Ok(())
        })
    };

    let status = cmd.status().map_err(|e| MinidockError::Exec {
        command: command.join(" "),
        message: e.to_string(),
    })?;
    let code = status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(1);
    tracing::debug!(pid, code, "exec finished");
    Ok(code)
}

/// Reads the environment of process `pid` from `/proc/{pid}/environ`.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn read_environ(pid: u32) -> Result<Vec<(String, String)>> {
    let path = format!("/proc/{pid}/environ");
    match std::fs::read(&path) {
        Ok(bytes) => Ok(parse_environ(&bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(MinidockError::NotFound {
            kind: "process",
            id: pid.to_string(),
        }),
        Err(e) => Err(MinidockError::io(path, e)),
    }
}

/// Splits NUL-separated `KEY=VALUE` pairs, skipping malformed entries.
fn parse_environ(bytes: &[u8]) -> Vec<(String, String)> {
    bytes
        .split(|b| *b == 0)
        .filter_map(|entry| {
            let entry = String::from_utf8_lossy(entry);
            let (key, value) = entry.split_once('=')?;
            (!key.is_empty()).then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}
