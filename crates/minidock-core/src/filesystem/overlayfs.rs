//! Per-container `OverlayFS` workspace.
//!
//! Each container owns `{root}/{lower,upper,work,merged}`: the image is
//! extracted into `lower`, writes land in `upper`, and the union mounted at
//! `merged` becomes the container's root filesystem and the source of
//! `commit`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use minidock_common::error::{MinidockError, Result};
use nix::mount::MsFlags;

use super::mount;
use super::volume::VolumeSpec;

const LOWER: &str = "lower";
const UPPER: &str = "upper";
const WORK: &str = "work";
const MERGED: &str = "merged";

/// Directory layout of one container's layered root filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayWorkspace {
    root: PathBuf,
}

impl OverlayWorkspace {
    /// Creates a handle for the workspace rooted at `root`.
    ///
    /// Nothing is touched on disk.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Workspace root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read-only layer holding the extracted image.
    #[must_use]
    pub fn lower(&self) -> PathBuf {
        self.root.join(LOWER)
    }

    /// Writable copy-on-write layer.
    #[must_use]
    pub fn upper(&self) -> PathBuf {
        self.root.join(UPPER)
    }

    /// Scratch directory required by `OverlayFS`.
    #[must_use]
    pub fn work(&self) -> PathBuf {
        self.root.join(WORK)
    }

    /// Union mount point; the container's root.
    #[must_use]
    pub fn merged(&self) -> PathBuf {
        self.root.join(MERGED)
    }

    /// Creates the four layer directories.
    ///
    /// # Errors
    ///
    /// Returns an error if any directory cannot be created.
    pub fn create_layers(&self) -> Result<()> {
        for dir in [self.lower(), self.upper(), self.work(), self.merged()] {
            std::fs::create_dir_all(&dir).map_err(|e| MinidockError::io(&dir, e))?;
        }
        tracing::debug!(root = %self.root.display(), "workspace layers created");
        Ok(())
    }

    /// Mounts the overlay union of `lower` and `upper` at `merged`.
    ///
    /// # Errors
    ///
    /// Returns an error if the `mount(2)` syscall fails.
    pub fn mount(&self) -> Result<()> {
        let merged = self.merged();
        let opts = self.mount_options();
        nix::mount::mount(
            Some("overlay"),
            &merged,
            Some("overlay"),
            MsFlags::empty(),
            Some(opts.as_str()),
        )
        .map_err(|e| MinidockError::PermissionDenied {
            message: format!("overlay mount failed: {e}"),
        })?;

        tracing::info!(merged = %merged.display(), "overlayfs mounted");
        Ok(())
    }

    /// Binds the host side of `volume` onto its target under `merged`.
    ///
    /// A malformed or empty spec is logged and ignored. Both sides are
    /// created if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created or the bind fails.
    pub fn mount_volume(&self, volume: &str) -> Result<()> {
        let Some(spec) = parse_volume(volume) else {
            return Ok(());
        };
        let target = spec.target_in(&self.merged());
        for dir in [spec.host.as_path(), target.as_path()] {
            std::fs::create_dir_all(dir).map_err(|e| MinidockError::io(dir, e))?;
        }
        mount::bind_mount(&spec.host, &target)?;
        tracing::info!(host = %spec.host.display(), target = %target.display(), "volume mounted");
        Ok(())
    }

    /// Unmounts and removes everything [`create_layers`], [`mount`] and
    /// [`mount_volume`] set up.
    ///
    /// Every step is attempted independently and failures are only logged,
    /// so calling this twice (or on a half-built workspace) is safe. A
    /// directory that is still a mount point is never removed.
    ///
    /// [`create_layers`]: Self::create_layers
    /// [`mount`]: Self::mount
    /// [`mount_volume`]: Self::mount_volume
    pub fn teardown(&self, volume: &str) {
        let merged = self.merged();

        let mut volume_busy = false;
        if let Some(spec) = VolumeSpec::parse(volume) {
            let target = spec.target_in(&merged);
            if mount::is_mount_point(&target) {
                if let Err(e) = mount::unmount(&target, false) {
                    tracing::error!(
                        target = %target.display(),
                        error = %e,
                        "volume unmount failed"
                    );
                }
                volume_busy = mount::is_mount_point(&target);
            }
        }

        if mount::is_mount_point(&merged) {
            if let Err(e) = mount::unmount(&merged, false) {
                tracing::error!(merged = %merged.display(), error = %e, "overlay unmount failed");
            }
        }

        let merged_busy = volume_busy || mount::is_mount_point(&merged);
        if merged_busy {
            tracing::error!(merged = %merged.display(), "merged still holds a mount, keeping it");
        } else {
            remove_tree(&merged);
        }
        for dir in [self.lower(), self.upper(), self.work()] {
            remove_tree(&dir);
        }
        if !merged_busy {
            remove_tree(&self.root);
        }
        tracing::info!(root = %self.root.display(), "workspace torn down");
    }

    fn mount_options(&self) -> String {
        format!(
            "lowerdir={},upperdir={},workdir={}",
            self.lower().display(),
            self.upper().display(),
            self.work().display()
        )
    }
}

fn parse_volume(volume: &str) -> Option<VolumeSpec> {
    if volume.is_empty() {
        return None;
    }
    let spec = VolumeSpec::parse(volume);
    if spec.is_none() {
        tracing::warn!(volume, "malformed volume spec ignored");
    }
    spec
}

fn remove_tree(dir: &Path) {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => tracing::debug!(dir = %dir.display(), "removed"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tracing::error!(dir = %dir.display(), error = %e, "remove failed"),
    }
}
