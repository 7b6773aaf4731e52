use snip_core::{ShortKey, StoreError};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ShortenerError {
    /// The derived key is already bound to another URL. Carries the key so
    /// the caller can report what was assigned.
    #[error("short key {key} is already bound to a different url")]
    Conflict { key: ShortKey },
    #[error("short key {0} not found")]
    NotFound(ShortKey),
    #[error("short key {0} has been deleted")]
    Gone(ShortKey),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("storage error: {0}")]
    Storage(StoreError),
}

impl From<StoreError> for ShortenerError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(key) => Self::Conflict { key },
            StoreError::NotFound(key) => Self::NotFound(key),
            StoreError::Gone(key) => Self::Gone(key),
            other => Self::Storage(other),
        }
    }
}
