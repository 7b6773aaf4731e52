use crate::short_key::ShortKey;
use thiserror::Error;

/// Result type for record store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("short key {0} is already bound to a different url")]
    Conflict(ShortKey),
    #[error("short key {0} not found")]
    NotFound(ShortKey),
    #[error("short key {0} has been deleted")]
    Gone(ShortKey),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage i/o failed: {0}")]
    Io(String),
    #[error("record log is corrupt at line {line}: {message}")]
    Corrupt { line: usize, message: String },
    #[error("schema migration failed: {0}")]
    Migration(String),
}

impl StoreError {
    /// Whether the error comes from the storage layer itself rather than
    /// from an expected outcome (conflict, not found, gone).
    pub fn is_storage_failure(&self) -> bool {
        !matches!(
            self,
            StoreError::Conflict(_) | StoreError::NotFound(_) | StoreError::Gone(_)
        )
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}
