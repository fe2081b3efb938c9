//! Error types for VertexDB core.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by store operations.
///
/// Every handler returns a success/error sum; nothing is thrown across
/// subsystems. Storage and serialization failures collapse into
/// [`StoreError::Unexpected`] with a textual reason.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The request failed a structural guard, or a forbidden pagination
    /// combination was supplied.
    #[error("bad request: {message}")]
    BadRequest {
        /// Description of the guard that failed.
        message: String,
    },

    /// A read, update, or restore targeted a row or cursor that does not
    /// exist.
    #[error("not found: {message}")]
    NotFound {
        /// Description of what was missing.
        message: String,
    },

    /// A required delete affected zero rows.
    #[error("delete failed: {message}")]
    DeleteFailed {
        /// Description of the delete that had no effect.
        message: String,
    },

    /// The dispatch envelope named an unknown `(type, operation)` pair.
    #[error("unknown operation: {kind}/{operation}")]
    UnknownOperation {
        /// The envelope type.
        kind: String,
        /// The envelope operation.
        operation: String,
    },

    /// Any other failure, carrying a textual reason.
    #[error("unexpected error: {message}")]
    Unexpected {
        /// Description of the failure.
        message: String,
    },
}

impl StoreError {
    /// Creates a bad-request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a delete-failed error.
    pub fn delete_failed(message: impl Into<String>) -> Self {
        Self::DeleteFailed {
            message: message.into(),
        }
    }

    /// Creates an unknown-operation error.
    pub fn unknown_operation(kind: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::UnknownOperation {
            kind: kind.into(),
            operation: operation.into(),
        }
    }

    /// Creates an unexpected error.
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
        }
    }

    /// HTTP status code the external transport maps this kind to.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest { .. } | Self::UnknownOperation { .. } | Self::DeleteFailed { .. } => {
                400
            }
            Self::NotFound { .. } => 404,
            Self::Unexpected { .. } => 500,
        }
    }
}

impl From<vertexdb_storage::StorageError> for StoreError {
    fn from(err: vertexdb_storage::StorageError) -> Self {
        Self::Unexpected {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Unexpected {
            message: format!("serialization: {err}"),
        }
    }
}
