//! Error types for buffer operations.

use thiserror::Error;

/// Result type for buffer operations.
pub type BufferResult<T> = Result<T, BufferError>;

/// Errors raised by the template buffer and its manager.
///
/// `DuplicateName` and `NotFound` signal misuse of the buffer and are never
/// swallowed; a low similarity score is not an error and shows up as an
/// empty retrieval instead.
#[derive(Debug, Error)]
pub enum BufferError {
    #[error("Template already exists: {0}")]
    DuplicateName(String),

    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Invalid value for {field}: {value} ({reason})")]
    InvalidConfig {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Buffer lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("Snapshot version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BufferError {
    pub fn invalid_config(
        field: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        BufferError::InvalidConfig {
            field: field.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}
