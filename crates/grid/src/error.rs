//! Grid error types.

use thiserror::Error;

/// Errors raised while configuring or executing a grid.
#[derive(Debug, Error)]
pub enum GridError {
    /// Missing or inconsistent wiring (grid, adapter, platform, query object).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Unsupported filter operator or malformed options payload.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A value outside of the accepted set.
    #[error("unexpected value: {0}")]
    UnexpectedValue(String),

    /// Parameter storage backend failure.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl GridError {
    /// Shorthand for a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        GridError::Configuration(msg.into())
    }

    /// Shorthand for an invalid-argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        GridError::InvalidArgument(msg.into())
    }
}

/// Result type alias using GridError.
pub type GridResult<T> = Result<T, GridError>;
