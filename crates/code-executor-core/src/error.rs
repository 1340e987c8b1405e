//! Error types for code-executor-core

use thiserror::Error;

/// A submission that was rejected before any worker was started.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Code is required")]
    MissingCode,

    #[error("Code exceeds maximum length of {max} characters")]
    CodeTooLong { len: usize, max: usize },

    #[error("Timeout must be a positive integer")]
    InvalidTimeout(i64),

    #[error("Invalid JSON")]
    MalformedJson(String),

    #[error("Invalid request: {0}")]
    InvalidField(String),

    #[error("Request body is not valid UTF-8")]
    Encoding,
}

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("failed to spawn worker: {0}")]
    Spawn(std::io::Error),

    #[error("worker supervision failed: {0}")]
    Supervise(String),

    #[error("resource limit error: {0}")]
    Limits(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("nix error: {0}")]
    Nix(#[from] nix::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ExecutorError {
    /// Whether the caller is at fault (as opposed to the service)
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
