//! Application error types.

use thiserror::Error;

/// Main application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    #[error("API error: {0}")]
    Client(#[from] secretary_client::ClientError),

    #[error("{0}")]
    Core(#[from] console_core::CoreError),

    #[error("Request failed: {0}")]
    Query(#[from] query_cache::QueryError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed command line; carries the usage hint.
    #[error("Usage: {0}")]
    Usage(String),
}

impl AppError {
    pub fn usage(hint: impl Into<String>) -> Self {
        AppError::Usage(hint.into())
    }
}

impl From<console_core::ValidationError> for AppError {
    fn from(error: console_core::ValidationError) -> Self {
        AppError::Core(error.into())
    }
}

/// Result type alias for application errors.
pub type AppResult<T> = Result<T, AppError>;
