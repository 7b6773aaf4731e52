use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use snip_core::{OwnerId, Record, RecordStore, Result, ShortKey, Stats, StoreError};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, trace};

/// In-memory implementation of [`RecordStore`] using DashMap.
///
/// Nothing is persisted. Check-and-insert goes through the entry API, which
/// holds the shard lock, so two concurrent `set` calls for one key cannot
/// both observe it as vacant.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: DashMap<ShortKey, Record>,
}

impl InMemoryStore {
    /// Creates a new in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn set(&self, key: &ShortKey, original_url: &str, owner: &OwnerId) -> Result<()> {
        match self.records.entry(key.clone()) {
            Entry::Occupied(existing) if existing.get().original_url == original_url => {
                trace!(key = %key, "record already stored");
                Ok(())
            }
            Entry::Occupied(_) => Err(StoreError::Conflict(key.clone())),
            Entry::Vacant(slot) => {
                slot.insert(Record::new(key.clone(), original_url, owner.clone()));
                debug!(key = %key, owner = %owner, "stored record");
                Ok(())
            }
        }
    }

    async fn get(&self, key: &ShortKey) -> Result<String> {
        let Some(record) = self.records.get(key) else {
            return Err(StoreError::NotFound(key.clone()));
        };

        if record.deleted {
            return Err(StoreError::Gone(key.clone()));
        }

        Ok(record.original_url.clone())
    }

    async fn get_all_by_owner(&self, owner: &OwnerId) -> Result<BTreeMap<ShortKey, String>> {
        Ok(self
            .records
            .iter()
            .filter(|entry| &entry.owner == owner && !entry.deleted)
            .map(|entry| (entry.key().clone(), entry.original_url.clone()))
            .collect())
    }

    async fn delete(&self, key: &ShortKey, owner: &OwnerId) -> Result<()> {
        if let Some(mut record) = self.records.get_mut(key) {
            if record.mark_deleted_by(owner) {
                debug!(key = %key, owner = %owner, "soft-deleted record");
            }
        }
        Ok(())
    }

    async fn stats(&self) -> Result<Stats> {
        let mut owners = HashSet::new();
        let mut urls = 0;
        for entry in self.records.iter() {
            urls += 1;
            owners.insert(entry.owner.clone());
        }

        Ok(Stats {
            urls,
            users: owners.len(),
        })
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
