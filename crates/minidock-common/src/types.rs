//! Domain primitive types used across the minidock workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::ID_LENGTH;
use crate::error::{MinidockError, Result};

/// Identifier of a container instance: a string of random decimal digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a container ID from an existing string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random 10-digit container ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(digits_from(uuid::Uuid::new_v4().as_bytes()))
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maps the random bytes of a UUID v4 to decimal digits.
///
/// Bytes 6 and 8 carry the version and variant bits and are skipped.
fn digits_from(bytes: &[u8; 16]) -> String {
    bytes
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != 6 && *i != 8)
        .take(ID_LENGTH)
        .map(|(_, b)| char::from(b'0' + b % 10))
        .collect()
}

/// Checks that `value` can name a container or image.
///
/// Names become single path components under the registry, workspace and
/// image roots, so only `[A-Za-z0-9_.-]` is accepted and `.`/`..` are
/// refused.
///
/// # Errors
///
/// Returns [`MinidockError::Config`] for an empty or unsafe name.
pub fn validate_name(kind: &str, value: &str) -> Result<()> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-');
    if value.is_empty() || value == "." || value == ".." || !value.chars().all(allowed) {
        return Err(MinidockError::Config {
            message: format!(
                "invalid {kind} name {value:?}: use only letters, digits, '_', '.' and '-'"
            ),
        });
    }
    Ok(())
}

/// Lifecycle status of a container as persisted in its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    /// The init process was launched and has not been stopped.
    Running,
    /// `stop` sent the termination signal.
    Stopped,
    /// Reserved: nothing transitions a container here yet.
    Exited,
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Exited => write!(f, "exited"),
        }
    }
}

/// Resource limits requested for a container.
///
/// Values are kept in the raw cgroupfs format and written verbatim; an
/// empty string (or a zero quota) means "unset". The kernel is the only
/// validator of `memory_limit`, `cpu_share` and `cpu_set`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Memory limit, e.g. `100m`.
    pub memory_limit: String,
    /// CPU quota as a percentage of one CPU (0-100).
    pub cpu_cfs_quota: u32,
    /// Relative CPU weight.
    pub cpu_share: String,
    /// CPU list, e.g. `0-1`.
    pub cpu_set: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_id_is_ten_digits() {
        let id = ContainerId::generate();
        assert_eq!(id.as_str().len(), ID_LENGTH);
        assert!(id.as_str().chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&ContainerStatus::Running).unwrap();
        assert_eq!(json, "\"running\"");
        let back: ContainerStatus = serde_json::from_str("\"stopped\"").unwrap();
        assert_eq!(back, ContainerStatus::Stopped);
    }

    #[test]
    fn id_digits_skip_uuid_version_and_variant_bytes() {
        let mut bytes = [0u8; 16];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = u8::try_from(i).unwrap();
        }
        assert_eq!(digits_from(&bytes), "0123457901");
    }

    #[test]
    fn plain_names_are_accepted() {
        for name in ["web", "web-1", "my_app.v2", "1234567890"] {
            assert!(validate_name("container", name).is_ok(), "{name}");
        }
    }

    #[test]
    fn path_like_names_are_rejected() {
        for name in ["", ".", "..", "../images", "a/b", "/etc", "web 1", "a\0b"] {
            let err = validate_name("container", name).unwrap_err();
            assert!(matches!(err, MinidockError::Config { .. }), "{name:?}");
        }
    }
}
