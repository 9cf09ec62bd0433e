//! Unified error taxonomy for the Corral workspace.
//!
//! Every crate reports failures through [`CorralError`]. The variants form a
//! closed set so callers branch on the kind of failure instead of matching
//! on message text.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::InstanceId;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum CorralError {
    /// The caller supplied an invalid instance declaration.
    #[error("invalid instance spec: {message}")]
    InvalidSpec {
        /// Description of the rejected field.
        message: String,
    },

    /// No metadata record exists for the identifier.
    #[error("instance not found: {id}")]
    NotFound {
        /// Identifier that was looked up.
        id: InstanceId,
    },

    /// Another record already uses the name.
    #[error("instance name already in use: {name}")]
    DuplicateName {
        /// The colliding name.
        name: String,
    },

    /// The container runtime already has a container with this name.
    #[error("runtime conflict for {name}: {message}")]
    RuntimeConflict {
        /// Container name involved in the conflict.
        name: String,
        /// Runtime-provided explanation.
        message: String,
    },

    /// The container runtime has no container with this name.
    #[error("container not found in runtime: {name}")]
    RuntimeNotFound {
        /// Container name that was addressed.
        name: String,
    },

    /// The container runtime refused the request.
    #[error("runtime rejected request: {message}")]
    RuntimeRejected {
        /// Runtime-provided explanation.
        message: String,
    },

    /// The container runtime could not be reached or did not answer in time.
    #[error("runtime unavailable: {message}")]
    RuntimeUnavailable {
        /// Description of the connectivity failure.
        message: String,
    },

    /// The metadata store could not complete the operation.
    #[error("metadata store unavailable: {message}")]
    StoreUnavailable {
        /// Description of the storage failure.
        message: String,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl CorralError {
    /// Shorthand for an [`CorralError::InvalidSpec`] error.
    pub fn invalid_spec(message: impl Into<String>) -> Self {
        Self::InvalidSpec {
            message: message.into(),
        }
    }

    /// Returns `true` for failures reported by the container runtime.
    #[must_use]
    pub const fn is_runtime(&self) -> bool {
        matches!(
            self,
            Self::RuntimeConflict { .. }
                | Self::RuntimeNotFound { .. }
                | Self::RuntimeRejected { .. }
                | Self::RuntimeUnavailable { .. }
        )
    }

    /// Transport-level status code an API layer should report.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::InvalidSpec { .. } => 400,
            Self::NotFound { .. } | Self::RuntimeNotFound { .. } => 404,
            Self::DuplicateName { .. } | Self::RuntimeConflict { .. } => 409,
            Self::RuntimeUnavailable { .. } => 502,
            Self::RuntimeRejected { .. }
            | Self::StoreUnavailable { .. }
            | Self::Config { .. }
            | Self::Io { .. }
            | Self::Serialization { .. } => 500,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, CorralError>;
