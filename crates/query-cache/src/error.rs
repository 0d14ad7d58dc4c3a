//! Query errors.

use thiserror::Error;

/// Failure of a query or mutation, shared by every waiter on the same request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct QueryError {
    /// HTTP status when the failure came from a backend response.
    pub status: Option<u16>,
    pub message: String,
}

impl QueryError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Error without a status (transport failures, local problems).
    pub fn message(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }
}
