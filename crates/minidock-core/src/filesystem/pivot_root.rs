//! Root filesystem switching via `pivot_root(2)`.
//!
//! Stronger than `chroot` because it replaces the root mount itself rather
//! than the process's view of `/`; the old root is detached afterwards so
//! nothing of the host tree stays reachable.

use std::path::Path;

use minidock_common::error::{MinidockError, Result};

use super::mount;

/// Name of the temporary directory the old root is moved into.
const PUT_OLD: &str = ".pivot_root";

/// Makes `new_root` the root of the calling process's mount namespace.
///
/// `/` is first made recursively private so the switch does not propagate
/// back to the host, and `new_root` is bind-mounted onto itself because
/// `pivot_root(2)` requires its argument to be a mount point. The old root
/// is lazily unmounted and its directory removed.
///
/// # Errors
///
/// Returns an error if any mount step, `pivot_root(2)` or `chdir` fails.
pub fn pivot_root(new_root: &Path) -> Result<()> {
    mount::make_private(Path::new("/"), true)?;
    mount::bind_mount(new_root, new_root)?;

    let put_old = new_root.join(PUT_OLD);
    std::fs::create_dir_all(&put_old).map_err(|e| MinidockError::io(&put_old, e))?;

    nix::unistd::pivot_root(new_root, &put_old).map_err(|e| MinidockError::PermissionDenied {
        message: format!("pivot_root to {} failed: {e}", new_root.display()),
    })?;
    nix::unistd::chdir("/").map_err(|e| MinidockError::PermissionDenied {
        message: format!("chdir to new root failed: {e}"),
    })?;

    let old_root = Path::new("/").join(PUT_OLD);
    mount::unmount(&old_root, true)?;
    std::fs::remove_dir(&old_root).map_err(|e| MinidockError::io(&old_root, e))?;

    tracing::debug!(new_root = %new_root.display(), "root switched");
    Ok(())
}
