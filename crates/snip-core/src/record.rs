use crate::short_key::{OwnerId, ShortKey};
use serde::{Deserialize, Serialize};

/// A stored mapping from a short key to its original URL.
///
/// `original_url` and `owner` never change after creation. `deleted` only
/// ever flips from `false` to `true`, and only through an owner-matching
/// delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub key: ShortKey,
    pub original_url: String,
    pub owner: OwnerId,
    pub deleted: bool,
}

impl Record {
    pub fn new(key: ShortKey, original_url: impl Into<String>, owner: OwnerId) -> Self {
        Self {
            key,
            original_url: original_url.into(),
            owner,
            deleted: false,
        }
    }

    /// Soft-deletes the record if `owner` owns it.
    ///
    /// Returns `true` only when this call flipped the flag.
    pub fn mark_deleted_by(&mut self, owner: &OwnerId) -> bool {
        if self.deleted || &self.owner != owner {
            return false;
        }
        self.deleted = true;
        true
    }
}

/// Aggregate counters over every stored record, soft-deleted ones included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Number of stored records.
    pub urls: usize,
    /// Number of distinct owners among them.
    pub users: usize,
}
