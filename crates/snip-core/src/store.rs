use crate::error::Result;
use crate::record::Stats;
use crate::short_key::{OwnerId, ShortKey};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// The storage contract shared by every backend.
///
/// Records are created once by [`set`](RecordStore::set), soft-deleted at
/// most once by [`delete`](RecordStore::delete) and never physically removed.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Stores a new record.
    ///
    /// Storing the same `original_url` under an existing key succeeds without
    /// changing anything. A different URL under an existing key returns
    /// [`StoreError::Conflict`](crate::StoreError::Conflict) and leaves the
    /// stored record untouched.
    async fn set(&self, key: &ShortKey, original_url: &str, owner: &OwnerId) -> Result<()>;

    /// Returns the original URL for `key`.
    ///
    /// Fails with `NotFound` if the key was never stored and `Gone` if the
    /// record has been deleted.
    async fn get(&self, key: &ShortKey) -> Result<String>;

    /// Returns every live record owned by `owner`, keyed by short key.
    async fn get_all_by_owner(&self, owner: &OwnerId) -> Result<BTreeMap<ShortKey, String>>;

    /// Soft-deletes `key` if it is owned by `owner`.
    ///
    /// Missing keys, foreign owners and already deleted records are all
    /// successful no-ops. Only storage failures are reported.
    async fn delete(&self, key: &ShortKey, owner: &OwnerId) -> Result<()>;

    /// Counts stored records and distinct owners. Recomputed on every call.
    async fn stats(&self) -> Result<Stats>;

    /// Checks that the backend is reachable.
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    /// Releases backend resources. Calling it again is a no-op.
    ///
    /// Backends that hold a file or a connection pool reject later
    /// operations with `Unavailable`.
    async fn close(&self) -> Result<()>;
}
