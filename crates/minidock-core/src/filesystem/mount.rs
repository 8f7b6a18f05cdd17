//! Mount utilities for container filesystem setup.
//!
//! Wraps the `mount(2)` family for bind mounts, propagation changes and
//! the pseudo-filesystems (`/proc`, `/dev`) mounted inside a container.

use std::os::unix::fs::MetadataExt;
use std::path::Path;

use minidock_common::error::{MinidockError, Result};
use nix::mount::{MntFlags, MsFlags};

use crate::cgroup::mountinfo::MountTable;

/// Creates a recursive bind mount from `source` onto `target`.
///
/// # Errors
///
/// Returns an error if the `mount(2)` syscall fails.
pub fn bind_mount(source: &Path, target: &Path) -> Result<()> {
    nix::mount::mount(
        Some(source),
        target,
        None::<&str>,
        MsFlags::MS_BIND | MsFlags::MS_REC,
        None::<&str>,
    )
    .map_err(|e| MinidockError::PermissionDenied {
        message: format!(
            "bind mount {} -> {} failed: {e}",
            source.display(),
            target.display()
        ),
    })?;
    tracing::debug!(source = %source.display(), target = %target.display(), "bind mount created");
    Ok(())
}

/// Sets the propagation of `target` to private, recursively if asked.
///
/// # Errors
///
/// Returns an error if the `mount(2)` syscall fails.
pub fn make_private(target: &Path, recursive: bool) -> Result<()> {
    let mut flags = MsFlags::MS_PRIVATE;
    if recursive {
        flags |= MsFlags::MS_REC;
    }
    nix::mount::mount(None::<&str>, target, None::<&str>, flags, None::<&str>).map_err(|e| {
        MinidockError::PermissionDenied {
            message: format!("making {} private failed: {e}", target.display()),
        }
    })
}

/// Unmounts `target`, lazily when `detach` is set.
///
/// # Errors
///
/// Returns an error if the `umount2(2)` syscall fails.
pub fn unmount(target: &Path, detach: bool) -> Result<()> {
    let flags = if detach {
        MntFlags::MNT_DETACH
    } else {
        MntFlags::empty()
    };
    nix::mount::umount2(target, flags).map_err(|e| MinidockError::PermissionDenied {
        message: format!("unmount {} failed: {e}", target.display()),
    })?;
    tracing::debug!(target = %target.display(), "unmounted");
    Ok(())
}

/// Returns `true` if `path` is the root of a mounted filesystem.
///
/// Looks `path` up in the mount table, which also catches bind mounts
/// within one filesystem. When the table is unreadable, falls back to
/// comparing the device of `path` with that of its parent. Paths that
/// cannot be inspected are reported as not mounted.
#[must_use]
pub fn is_mount_point(path: &Path) -> bool {
    let Ok(path) = std::fs::canonicalize(path) else {
        return false;
    };
    match MountTable::load() {
        Ok(table) => table.entries().iter().any(|e| e.mount_point == path),
        Err(e) => {
            tracing::debug!(error = %e, "mount table unavailable, comparing devices");
            crosses_device(&path)
        }
    }
}

fn crosses_device(path: &Path) -> bool {
    let Some(parent) = path.parent() else {
        return true;
    };
    match (std::fs::metadata(path), std::fs::metadata(parent)) {
        (Ok(meta), Ok(parent)) => meta.dev() != parent.dev(),
        _ => false,
    }
}

/// Mounts a fresh `proc` at `/proc` and a `tmpfs` at `/dev`.
///
/// Must run inside the container's mount and PID namespaces after the root
/// switch. Each failure is logged and skipped; the container still starts.
pub fn mount_pseudo_filesystems() {
    let proc_flags = MsFlags::MS_NOEXEC | MsFlags::MS_NOSUID | MsFlags::MS_NODEV;
    mount_pseudo(Path::new("/proc"), "proc", proc_flags, None);

    let dev_flags = MsFlags::MS_NOSUID | MsFlags::MS_STRICTATIME;
    mount_pseudo(Path::new("/dev"), "tmpfs", dev_flags, Some("mode=755"));
}

fn mount_pseudo(target: &Path, fstype: &str, flags: MsFlags, data: Option<&str>) {
    if let Err(e) = std::fs::create_dir_all(target) {
        tracing::warn!(target = %target.display(), error = %e, "cannot create mount point");
    }
    if let Err(e) = make_private(target, false) {
        tracing::warn!(target = %target.display(), error = %e, "propagation change skipped");
    }
    match nix::mount::mount(Some(fstype), target, Some(fstype), flags, data) {
        Ok(()) => tracing::debug!(target = %target.display(), fstype, "pseudo filesystem mounted"),
        Err(e) => {
            tracing::error!(target = %target.display(), fstype, error = %e, "mount failed");
        }
    }
}
