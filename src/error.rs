//! Error types for the inspector.
//!
//! None of these ever escape an [`Inspector`](crate::Inspector) method: every
//! failure is logged and recorded as an attribute on the invocation record.

use std::path::PathBuf;

/// Failure reading or parsing an OS-exposed text source.
///
/// A source that simply does not exist is not an error; readers return
/// `Ok(None)` (or empty values) in that case.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

impl SourceError {
    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        SourceError::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Failure establishing the persisted container identity.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("Failed to read existing container id {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write new container id {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Container id file {0} is empty")]
    Empty(PathBuf),
}

/// The readable fields of a result value could not be enumerated.
#[derive(Debug, thiserror::Error)]
pub enum IntrospectionError {
    #[error("Result value is not a field container (got {0})")]
    NotAnObject(&'static str),

    #[error("Result value could not be serialized: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Invalid inspector configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must not be empty")]
    EmptyPath(&'static str),

    #[error("container_id_path must be absolute, got {0}")]
    RelativeContainerIdPath(PathBuf),

    #[error("Invalid log_level '{0}', expected off, error, warn, info, debug or trace")]
    InvalidLogLevel(String),
}

/// A memory recommendation could not be derived from the invocation.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RecommendError {
    #[error("functionMemory '{0}' is not a number of megabytes")]
    InvalidMemory(String),

    #[error("functionMemory is not available")]
    MissingMemory,

    #[error("userRuntime must be positive, got {0} ms")]
    NoUserRuntime(i64),
}
