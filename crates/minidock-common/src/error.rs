//! Unified error types for the minidock workspace.
//!
//! Soft failures (cgroup writes, workspace teardown) are logged at the call
//! site and never reach this type; everything that aborts an operation does.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum MinidockError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value or invocation is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// The container is in a state that does not allow the operation.
    #[error("cannot {operation} container {id}: it is {state}")]
    StateConflict {
        /// Container name.
        id: String,
        /// Current lifecycle state.
        state: String,
        /// Operation that was refused.
        operation: &'static str,
    },

    /// A privileged syscall (mount, pivot_root, clone, setns) failed.
    #[error("permission denied: {message}")]
    PermissionDenied {
        /// Description of the denied operation.
        message: String,
    },

    /// The init process could not resolve or execute the user command.
    #[error("cannot execute {command}: {message}")]
    Exec {
        /// Command that failed.
        command: String,
        /// Failure reason.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl MinidockError {
    /// Builds a [`MinidockError::Io`] for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, MinidockError>;
