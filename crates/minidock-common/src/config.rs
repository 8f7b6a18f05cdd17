//! Runtime context threaded through every component.
//!
//! All on-disk locations (registry, workspaces, images) and the cgroup
//! parent name live here instead of in process-wide globals, so tests and
//! alternative installations can point the runtime anywhere.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants;

/// Locations and names the runtime operates on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeContext {
    /// Directory with one `<name>/config.json` record per container.
    pub registry_root: PathBuf,
    /// Directory with one `<name>/{lower,upper,work,merged}` set per container.
    pub workspace_root: PathBuf,
    /// Directory holding `<image>.tar` archives.
    pub image_root: PathBuf,
    /// Cgroup directory created below every subsystem mount point.
    pub cgroup_parent: String,
}

impl Default for RuntimeContext {
    fn default() -> Self {
        Self {
            registry_root: PathBuf::from(constants::DEFAULT_REGISTRY_ROOT),
            workspace_root: PathBuf::from(constants::DEFAULT_WORKSPACE_ROOT),
            image_root: PathBuf::from(constants::DEFAULT_IMAGE_ROOT),
            cgroup_parent: constants::DEFAULT_CGROUP_PARENT.to_string(),
        }
    }
}

impl RuntimeContext {
    /// Creates a context rooted entirely under `base`.
    ///
    /// Used by tests and by installations that keep all state in one tree.
    #[must_use]
    pub fn rooted_at(base: &Path) -> Self {
        Self {
            registry_root: base.join("registry"),
            workspace_root: base.join("containers"),
            image_root: base.join("images"),
            cgroup_parent: constants::DEFAULT_CGROUP_PARENT.to_string(),
        }
    }

    /// Root of the overlay workspace of container `name`.
    #[must_use]
    pub fn workspace_dir(&self, name: &str) -> PathBuf {
        self.workspace_root.join(name)
    }

    /// Archive path of image `image`.
    #[must_use]
    pub fn image_archive(&self, image: &str) -> PathBuf {
        self.image_root
            .join(format!("{image}.{}", constants::IMAGE_EXTENSION))
    }

    /// Cgroup path of container `name`, relative to a subsystem mount point.
    #[must_use]
    pub fn cgroup_path(&self, name: &str) -> PathBuf {
        Path::new(&self.cgroup_parent).join(name)
    }
}
