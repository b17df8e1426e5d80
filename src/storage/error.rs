use thiserror::Error;

use crate::storage::retry::Transient;

/// Durable storage errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Record not found: {0}")]
    NotFound(String),
}

impl Transient for StorageError {
    /// Only outages and timeouts can succeed on a second attempt
    fn is_transient(&self) -> bool {
        matches!(self, StorageError::Unavailable(_))
    }
}
