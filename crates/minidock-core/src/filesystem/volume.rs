//! Parsing of `host:container` volume specifications.

use std::path::{Component, Path, PathBuf};

/// A host directory bound into the container filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeSpec {
    /// Directory on the host.
    pub host: PathBuf,
    /// Path inside the container root, relative to `merged`.
    pub container: PathBuf,
}

impl VolumeSpec {
    /// Parses a raw `host:container` spec.
    ///
    /// Returns `None` unless the spec has exactly two non-empty components
    /// and the container side has no `..` component. An empty string means
    /// "no volume" and also yields `None`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split(':');
        let host = parts.next().filter(|s| !s.is_empty())?;
        let container = parts.next().filter(|s| !s.is_empty())?;
        if parts.next().is_some() {
            return None;
        }
        let container = PathBuf::from(container);
        if container.components().any(|c| c == Component::ParentDir) {
            return None;
        }
        Some(Self {
            host: PathBuf::from(host),
            container,
        })
    }

    /// Mount target of this volume below the container root `merged`.
    ///
    /// The root component is dropped and `parse` refuses `..`, so the
    /// target always lies below `merged`.
    #[must_use]
    pub fn target_in(&self, merged: &Path) -> PathBuf {
        let relative: PathBuf = self
            .container
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .collect();
        merged.join(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_components() {
        let spec = VolumeSpec::parse("/data:/mnt/data").unwrap();
        assert_eq!(spec.host, Path::new("/data"));
        assert_eq!(spec.container, Path::new("/mnt/data"));
    }

    #[test]
    fn malformed_specs_are_rejected() {
        for raw in ["", "/data", "/data:", ":/mnt", "/a:/b:/c", ":"] {
            assert_eq!(VolumeSpec::parse(raw), None, "{raw:?}");
        }
    }

    #[test]
    fn parent_components_in_target_are_rejected() {
        for raw in ["/host:../../../etc", "/host:/mnt/../../etc", "/host:.."] {
            assert_eq!(VolumeSpec::parse(raw), None, "{raw:?}");
        }
    }

    #[test]
    fn parent_components_on_host_side_are_kept() {
        let spec = VolumeSpec::parse("/srv/../data:/mnt").unwrap();
        assert_eq!(spec.host, Path::new("/srv/../data"));
    }

    #[test]
    fn redundant_separators_do_not_escape() {
        let spec = VolumeSpec::parse("/data://mnt/./data").unwrap();
        let target = spec.target_in(Path::new("/ws/web/merged"));
        assert_eq!(target, Path::new("/ws/web/merged/mnt/data"));
    }

    #[test]
    fn target_stays_under_merged() {
        let spec = VolumeSpec::parse("/data:/mnt/data").unwrap();
        assert_eq!(
            spec.target_in(Path::new("/ws/web/merged")),
            Path::new("/ws/web/merged/mnt/data")
        );
        let relative = VolumeSpec::parse("/data:inner").unwrap();
        assert_eq!(
            relative.target_in(Path::new("/m")),
            Path::new("/m/inner")
        );
    }
}
