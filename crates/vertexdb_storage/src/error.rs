//! Error types for storage operations.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A batched operation exceeded the per-call key cap.
    #[error("batch of {actual} keys exceeds the {limit}-key limit")]
    BatchTooLarge {
        /// The per-call cap.
        limit: usize,
        /// The number of keys supplied.
        actual: usize,
    },

    /// A transaction closure returned an error; staged writes were discarded.
    #[error("transaction aborted: {reason}")]
    TransactionAborted {
        /// Reason for the abort.
        reason: String,
    },

    /// The backend rejected or failed an operation.
    #[error("backend error: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },

    /// The requested blob does not exist.
    #[error("blob not found: {name}")]
    BlobNotFound {
        /// Name of the missing blob.
        name: String,
    },
}

impl StorageError {
    /// Creates a batch-too-large error.
    pub fn batch_too_large(limit: usize, actual: usize) -> Self {
        Self::BatchTooLarge { limit, actual }
    }

    /// Creates a transaction-aborted error.
    pub fn transaction_aborted(reason: impl Into<String>) -> Self {
        Self::TransactionAborted {
            reason: reason.into(),
        }
    }

    /// Creates a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Creates a blob-not-found error.
    pub fn blob_not_found(name: impl Into<String>) -> Self {
        Self::BlobNotFound { name: name.into() }
    }
}
