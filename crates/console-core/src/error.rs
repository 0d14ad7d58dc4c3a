//! View-model errors.

use crate::instances::InstanceAction;
use query_cache::QueryError;
use secretary_client::ClientError;
use thiserror::Error;

/// Form and input problems caught before any request is sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Name is required")]
    EmptyName,

    #[error("Invalid color {0}: expected #rgb or #rrggbb")]
    InvalidColor(String),

    #[error("Invalid number for {field}: {value}")]
    InvalidNumber { field: String, value: String },

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Invalid {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Retention must be at least 1 day")]
    RetentionDays,
}

/// View-model error type.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Cannot {action} instance {id}: {reason}")]
    Transition {
        id: String,
        action: InstanceAction,
        reason: String,
    },

    #[error("{action} already in progress for {id}")]
    Pending { id: String, action: String },

    #[error("Unknown instance: {0}")]
    UnknownInstance(String),

    #[error("No instance selected")]
    NoSelection,

    #[error("{0}")]
    Query(#[from] QueryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ClientError> for CoreError {
    fn from(error: ClientError) -> Self {
        CoreError::Query(to_query_error(error))
    }
}

/// Result type alias for view-model operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Convert a client failure into the cache's shareable error, keeping the
/// backend message verbatim so it can be shown as-is.
pub fn to_query_error(error: ClientError) -> QueryError {
    match error {
        ClientError::Api { status, message } => QueryError::new(Some(status), message),
        ClientError::NotFound(message) => QueryError::new(Some(404), message),
        other => QueryError::new(other.status(), other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_keeps_backend_message() {
        let error = to_query_error(ClientError::Api {
            status: 409,
            message: "Bot is not running".into(),
        });
        assert_eq!(error.status, Some(409));
        assert_eq!(error.to_string(), "Bot is not running");
    }

    #[test]
    fn test_unauthorized_maps_to_401() {
        let error = to_query_error(ClientError::Unauthorized);
        assert_eq!(error.status, Some(401));
    }
}
