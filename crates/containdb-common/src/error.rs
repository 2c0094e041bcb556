//! Unified error types for the ContainDB workspace.
//!
//! The variants follow the failure taxonomy of the orchestrator. Resource
//! conflicts are not errors: they reach the operator as explicit choices.
//! Callers decide whether a variant is fatal for the process or only for
//! the current action via [`ContainDbError::is_fatal`].

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum ContainDbError {
    /// The user interrupted a prompt or the process received a cancellation signal.
    #[error("operation cancelled")]
    Cancelled,

    /// The host cannot run the tool (platform, runtime binary, privilege).
    #[error("precondition failed: {message}")]
    Precondition {
        /// Description of the unmet precondition.
        message: String,
    },

    /// An external runtime command exited with a non-zero status.
    #[error("`{command}` failed with exit code {code:?}: {stderr}")]
    CommandFailed {
        /// Rendered command line (secrets redacted).
        command: String,
        /// Exit code, or `None` when terminated by a signal or deadline.
        code: Option<i32>,
        /// Captured standard error, trimmed.
        stderr: String,
    },

    /// Removal refused because a container still references the resource.
    #[error("{kind} '{name}' is in use by container '{owner}'")]
    InUse {
        /// Resource class (`image` or `volume`).
        kind: &'static str,
        /// Resource name or reference.
        name: String,
        /// Name of the container holding the reference.
        owner: String,
    },

    /// A required credential was left blank.
    #[error("{field} cannot be empty")]
    MissingCredential {
        /// Human-readable field name.
        field: &'static str,
    },

    /// A value typed by the user is not acceptable for the field.
    #[error("invalid {field}: '{value}'")]
    InvalidInput {
        /// Field being filled.
        field: &'static str,
        /// Rejected value.
        value: String,
    },

    /// The container runtime refused an imported descriptor.
    #[error("descriptor {path} was rejected by the runtime: {stderr}")]
    ImportRejected {
        /// Descriptor path.
        path: PathBuf,
        /// Runtime error output, verbatim.
        stderr: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path or program where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Runtime output could not be interpreted.
    #[error("unexpected runtime output: {message}")]
    Parse {
        /// Description of the malformed output.
        message: String,
    },

    /// An asset download failed.
    #[error("download of {url} failed: {message}")]
    Download {
        /// Source URL.
        url: String,
        /// Failure description.
        message: String,
    },

    /// JSON (de)serialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },

    /// YAML (de)serialization failed.
    #[error("descriptor error: {source}")]
    Descriptor {
        /// Underlying YAML error.
        #[from]
        source: serde_yaml::Error,
    },
}

impl ContainDbError {
    /// Returns whether this error must terminate the process rather than
    /// return control to the top-level menu.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Precondition { .. })
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, ContainDbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_and_preconditions_are_fatal() {
        assert!(ContainDbError::Cancelled.is_fatal());
        assert!(
            ContainDbError::Precondition {
                message: "docker missing".into()
            }
            .is_fatal()
        );
    }

    #[test]
    fn in_use_is_recoverable_and_names_owner() {
        let err = ContainDbError::InUse {
            kind: "volume",
            name: "redis-data".into(),
            owner: "redis-container".into(),
        };
        assert!(!err.is_fatal());
        assert_eq!(
            err.to_string(),
            "volume 'redis-data' is in use by container 'redis-container'"
        );
    }

    #[test]
    fn command_failure_is_recoverable() {
        let err = ContainDbError::CommandFailed {
            command: "docker run".into(),
            code: Some(125),
            stderr: "port is already allocated".into(),
        };
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("125"));
    }
}
