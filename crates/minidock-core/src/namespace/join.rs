//! Entering the namespaces of a running container.
//!
//! All handles are opened up front, while `/proc` of the host is still
//! visible; joining happens afterwards, possibly in a forked child.

use std::fs::File;
use std::os::fd::AsFd;
use std::path::PathBuf;

use minidock_common::error::{MinidockError, Result};

use super::Namespace;

/// An open `/proc/{pid}/ns/*` handle.
#[derive(Debug)]
pub struct NamespaceHandle {
    kind: Namespace,
    file: File,
}

impl NamespaceHandle {
    /// Opens namespace `kind` of process `pid`.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace file cannot be opened, typically
    /// because the process is gone.
    pub fn open(pid: u32, kind: Namespace) -> Result<Self> {
        let path = ns_path(pid, kind);
        let file = File::open(&path).map_err(|e| MinidockError::io(&path, e))?;
        Ok(Self { kind, file })
    }

    /// Namespace kind of this handle.
    #[must_use]
    pub const fn kind(&self) -> Namespace {
        self.kind
    }

    /// Moves the calling thread into this namespace.
    ///
    /// Safe to call between `fork` and `exec`: it only performs the
    /// `setns(2)` syscall and allocates nothing.
    ///
    /// # Errors
    ///
    /// Returns the raw errno if `setns(2)` fails.
    pub fn enter(&self) -> nix::Result<()> {
        nix::sched::setns(self.file.as_fd(), self.kind.clone_flag())
    }
}

/// Opens every namespace of `pid` in [`Namespace::JOIN_ORDER`].
///
/// # Errors
///
/// Returns the first open failure.
pub fn open_all(pid: u32) -> Result<Vec<NamespaceHandle>> {
    Namespace::JOIN_ORDER
        .iter()
        .map(|&kind| NamespaceHandle::open(pid, kind))
        .collect()
}

fn ns_path(pid: u32, kind: Namespace) -> PathBuf {
    PathBuf::from(format!("/proc/{pid}/ns/{}", kind.proc_name()))
}
