use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use snip_core::{OwnerId, Record, RecordStore, Result, ShortKey, Stats, StoreError};
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, trace, warn};

/// One line of the record log.
///
/// The first line for a key creates the record. A later line for the same
/// key with `deleted: true` and the same owner is a tombstone.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LogEntry {
    id: ShortKey,
    url: String,
    user_id: OwnerId,
    #[serde(default)]
    deleted: bool,
}

impl LogEntry {
    fn created(record: &Record) -> Self {
        Self {
            id: record.key.clone(),
            url: record.original_url.clone(),
            user_id: record.owner.clone(),
            deleted: false,
        }
    }

    fn tombstone(record: &Record) -> Self {
        Self {
            deleted: true,
            ..Self::created(record)
        }
    }

    fn encode(&self) -> Result<Vec<u8>> {
        let mut line = serde_json::to_vec(self)
            .map_err(|e| StoreError::InvalidData(format!("failed to encode record: {e}")))?;
        line.push(b'\n');
        Ok(line)
    }
}

/// Outcome of scanning an existing log.
#[derive(Debug, Default)]
struct Replay {
    index: HashMap<ShortKey, Record>,
    /// Length of the prefix made of complete records.
    committed_len: usize,
    /// The last record is complete but its newline never reached the disk.
    missing_newline: bool,
}

fn replay(bytes: &[u8]) -> Result<Replay> {
    let mut replay = Replay::default();
    let mut offset = 0;
    let mut line_no = 0;

    while offset < bytes.len() {
        line_no += 1;
        let (line, next, terminated) = match bytes[offset..].iter().position(|b| *b == b'\n') {
            Some(pos) => (&bytes[offset..offset + pos], offset + pos + 1, true),
            None => (&bytes[offset..], bytes.len(), false),
        };

        if line.iter().all(u8::is_ascii_whitespace) {
            replay.committed_len = next;
            offset = next;
            continue;
        }

        match serde_json::from_slice::<LogEntry>(line) {
            Ok(entry) => {
                apply(&mut replay.index, entry);
                replay.committed_len = next;
                replay.missing_newline = !terminated;
            }
            // torn write: the process died before the record was complete
            Err(_) if !terminated => break,
            Err(err) => {
                return Err(StoreError::Corrupt {
                    line: line_no,
                    message: err.to_string(),
                })
            }
        }

        offset = next;
    }

    Ok(replay)
}

fn apply(index: &mut HashMap<ShortKey, Record>, entry: LogEntry) {
    match index.entry(entry.id.clone()) {
        Entry::Vacant(_) if entry.deleted => {
            warn!(key = %entry.id, "ignoring tombstone for unknown record");
        }
        Entry::Vacant(slot) => {
            slot.insert(Record {
                key: entry.id,
                original_url: entry.url,
                owner: entry.user_id,
                deleted: entry.deleted,
            });
        }
        Entry::Occupied(mut slot) => {
            if entry.deleted {
                slot.get_mut().mark_deleted_by(&entry.user_id);
            }
        }
    }
}

#[derive(Debug)]
struct State {
    index: HashMap<ShortKey, Record>,
    /// `None` once the store is closed.
    file: Option<File>,
    /// Bytes of complete records in the log.
    len: u64,
}

impl State {
    fn ensure_open(&self) -> Result<()> {
        match self.file {
            Some(_) => Ok(()),
            None => Err(closed()),
        }
    }

    /// Appends one record and syncs it before returning. A failed write is
    /// rolled back so that a partial line never precedes later records.
    async fn append(&mut self, entry: &LogEntry) -> Result<()> {
        let line = entry.encode()?;
        let file = self.file.as_mut().ok_or_else(closed)?;

        if let Err(err) = write_synced(file, &line).await {
            if let Err(truncate_err) = file.set_len(self.len).await {
                warn!(error = %truncate_err, "failed to roll back partial record");
            }
            return Err(err.into());
        }

        self.len += line.len() as u64;
        Ok(())
    }
}

async fn write_synced(file: &mut File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_data().await
}

fn closed() -> StoreError {
    StoreError::Unavailable("file store is closed".to_string())
}

/// Append-only file implementation of [`RecordStore`].
///
/// The whole log is replayed into an in-memory index at open time and reads
/// are served from that index. Every mutation is appended as a JSON line and
/// synced to disk before the index is updated, all under one write lock.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    state: RwLock<State>,
}

impl FileStore {
    /// Opens the log at `path`, creating it if missing.
    ///
    /// A missing or empty log means no records yet. A malformed line in the
    /// middle of the log is reported as [`StoreError::Corrupt`]. A malformed
    /// final line without its newline is a torn write and is cut off.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err.into()),
        };

        let replay = replay(&bytes)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        let mut len = replay.committed_len as u64;
        if replay.committed_len < bytes.len() {
            warn!(
                path = %path.display(),
                discarded_bytes = bytes.len() - replay.committed_len,
                "discarding torn record at end of log"
            );
            file.set_len(len).await?;
        }
        if replay.missing_newline {
            write_synced(&mut file, b"\n").await?;
            len += 1;
        }

        info!(
            path = %path.display(),
            records = replay.index.len(),
            "opened file store"
        );

        Ok(Self {
            path,
            state: RwLock::new(State {
                index: replay.index,
                file: Some(file),
                len,
            }),
        })
    }

    /// Returns the path of the backing log.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RecordStore for FileStore {
    async fn set(&self, key: &ShortKey, original_url: &str, owner: &OwnerId) -> Result<()> {
        let mut state = self.state.write().await;
        state.ensure_open()?;

        if let Some(existing) = state.index.get(key) {
            if existing.original_url == original_url {
                trace!(key = %key, "record already stored");
                return Ok(());
            }
            return Err(StoreError::Conflict(key.clone()));
        }

        let record = Record::new(key.clone(), original_url, owner.clone());
        state.append(&LogEntry::created(&record)).await?;
        state.index.insert(key.clone(), record);
        debug!(key = %key, owner = %owner, "appended record");
        Ok(())
    }

    async fn get(&self, key: &ShortKey) -> Result<String> {
        let state = self.state.read().await;
        state.ensure_open()?;

        match state.index.get(key) {
            None => Err(StoreError::NotFound(key.clone())),
            Some(record) if record.deleted => Err(StoreError::Gone(key.clone())),
            Some(record) => Ok(record.original_url.clone()),
        }
    }

    async fn get_all_by_owner(&self, owner: &OwnerId) -> Result<BTreeMap<ShortKey, String>> {
        let state = self.state.read().await;
        state.ensure_open()?;

        Ok(state
            .index
            .values()
            .filter(|record| &record.owner == owner && !record.deleted)
            .map(|record| (record.key.clone(), record.original_url.clone()))
            .collect())
    }

    async fn delete(&self, key: &ShortKey, owner: &OwnerId) -> Result<()> {
        let mut state = self.state.write().await;
        state.ensure_open()?;

        let tombstone = match state.index.get(key) {
            Some(record) if !record.deleted && &record.owner == owner => {
                LogEntry::tombstone(record)
            }
            _ => {
                trace!(key = %key, owner = %owner, "nothing to delete");
                return Ok(());
            }
        };

        state.append(&tombstone).await?;
        if let Some(record) = state.index.get_mut(key) {
            record.mark_deleted_by(owner);
        }
        debug!(key = %key, owner = %owner, "appended tombstone");
        Ok(())
    }

    async fn stats(&self) -> Result<Stats> {
        let state = self.state.read().await;
        state.ensure_open()?;

        let owners: HashSet<&OwnerId> = state.index.values().map(|r| &r.owner).collect();
        Ok(Stats {
            urls: state.index.len(),
            users: owners.len(),
        })
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(mut file) = state.file.take() {
            file.flush().await?;
            file.sync_all().await?;
            debug!(path = %self.path.display(), "closed file store");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key(s: &str) -> ShortKey {
        ShortKey::new(s)
    }

    fn owner(s: &str) -> OwnerId {
        OwnerId::new(s)
    }

    fn log_path(dir: &TempDir) -> PathBuf {
        dir.path().join("records.jsonl")
    }

    #[tokio::test]
    async fn missing_file_opens_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(log_path(&dir)).await.unwrap();

        assert_eq!(store.stats().await.unwrap(), Stats::default());
        assert!(log_path(&dir).exists());
    }

    #[tokio::test]
    async fn empty_file_opens_empty() {
        let dir = TempDir::new().unwrap();
        std::fs::write(log_path(&dir), b"").unwrap();

        let store = FileStore::open(log_path(&dir)).await.unwrap();
        assert_eq!(store.stats().await.unwrap(), Stats::default());
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileStore::open(log_path(&dir)).await.unwrap();
            store.set(&key("1"), "https://a.com", &owner("u1")).await.unwrap();
            store.set(&key("2"), "https://b.com", &owner("u2")).await.unwrap();
            store.close().await.unwrap();
        }

        let store = FileStore::open(log_path(&dir)).await.unwrap();
        assert_eq!(store.get(&key("1")).await.unwrap(), "https://a.com");
        assert_eq!(store.get(&key("2")).await.unwrap(), "https://b.com");
        assert_eq!(store.stats().await.unwrap(), Stats { urls: 2, users: 2 });
    }

    #[tokio::test]
    async fn idempotent_set_appends_once() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(log_path(&dir)).await.unwrap();

        store.set(&key("1"), "https://a.com", &owner("u1")).await.unwrap();
        store.set(&key("1"), "https://a.com", &owner("u1")).await.unwrap();

        let contents = std::fs::read_to_string(log_path(&dir)).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[tokio::test]
    async fn conflicting_set_is_rejected_and_not_logged() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(log_path(&dir)).await.unwrap();

        store.set(&key("1"), "https://a.com", &owner("u1")).await.unwrap();
        let err = store
            .set(&key("1"), "https://b.com", &owner("u1"))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.get(&key("1")).await.unwrap(), "https://a.com");
        let contents = std::fs::read_to_string(log_path(&dir)).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[tokio::test]
    async fn delete_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileStore::open(log_path(&dir)).await.unwrap();
            store.set(&key("1"), "https://a.com", &owner("u1")).await.unwrap();
            store.delete(&key("1"), &owner("u1")).await.unwrap();
            store.close().await.unwrap();
        }

        let store = FileStore::open(log_path(&dir)).await.unwrap();
        assert!(matches!(
            store.get(&key("1")).await.unwrap_err(),
            StoreError::Gone(_)
        ));
        assert!(store.get_all_by_owner(&owner("u1")).await.unwrap().is_empty());
        assert_eq!(store.stats().await.unwrap().urls, 1);
    }

    #[tokio::test]
    async fn ignored_deletes_append_nothing() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(log_path(&dir)).await.unwrap();
        store.set(&key("1"), "https://a.com", &owner("u1")).await.unwrap();

        store.delete(&key("1"), &owner("u2")).await.unwrap();
        store.delete(&key("missing"), &owner("u1")).await.unwrap();
        store.delete(&key("1"), &owner("u1")).await.unwrap();
        store.delete(&key("1"), &owner("u1")).await.unwrap();

        let contents = std::fs::read_to_string(log_path(&dir)).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[tokio::test]
    async fn lines_without_deleted_field_are_live_records() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            log_path(&dir),
            "{\"id\":\"7\",\"url\":\"https://a.com\",\"user_id\":\"u1\"}\n",
        )
        .unwrap();

        let store = FileStore::open(log_path(&dir)).await.unwrap();
        assert_eq!(store.get(&key("7")).await.unwrap(), "https://a.com");
    }

    #[tokio::test]
    async fn tombstone_from_other_owner_is_ignored_on_replay() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            log_path(&dir),
            concat!(
                "{\"id\":\"7\",\"url\":\"https://a.com\",\"user_id\":\"u1\"}\n",
                "{\"id\":\"7\",\"url\":\"https://a.com\",\"user_id\":\"u2\",\"deleted\":true}\n",
            ),
        )
        .unwrap();

        let store = FileStore::open(log_path(&dir)).await.unwrap();
        assert_eq!(store.get(&key("7")).await.unwrap(), "https://a.com");
    }

    #[tokio::test]
    async fn tombstone_without_record_is_ignored_on_replay() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            log_path(&dir),
            "{\"id\":\"9\",\"url\":\"https://a.com\",\"user_id\":\"u1\",\"deleted\":true}\n",
        )
        .unwrap();

        let store = FileStore::open(log_path(&dir)).await.unwrap();

        let err = store.get(&key("9")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert_eq!(store.stats().await.unwrap(), Stats::default());

        store
            .set(&key("9"), "https://b.com", &owner("u2"))
            .await
            .unwrap();
        assert_eq!(store.get(&key("9")).await.unwrap(), "https://b.com");
    }

    #[tokio::test]
    async fn corrupt_line_in_the_middle_fails_open() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            log_path(&dir),
            concat!(
                "{\"id\":\"1\",\"url\":\"https://a.com\",\"user_id\":\"u1\"}\n",
                "not json\n",
                "{\"id\":\"2\",\"url\":\"https://b.com\",\"user_id\":\"u1\"}\n",
            ),
        )
        .unwrap();

        let err = FileStore::open(log_path(&dir)).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { line: 2, .. }));
    }

    #[tokio::test]
    async fn torn_tail_is_discarded_and_appends_resume() {
        let dir = TempDir::new().unwrap();
        let committed = "{\"id\":\"1\",\"url\":\"https://a.com\",\"user_id\":\"u1\"}\n";
        std::fs::write(
            log_path(&dir),
            format!("{committed}{{\"id\":\"2\",\"url\":\"https://b"),
        )
        .unwrap();

        let store = FileStore::open(log_path(&dir)).await.unwrap();
        assert_eq!(store.get(&key("1")).await.unwrap(), "https://a.com");
        assert!(matches!(
            store.get(&key("2")).await.unwrap_err(),
            StoreError::NotFound(_)
        ));
        assert_eq!(std::fs::read_to_string(log_path(&dir)).unwrap(), committed);

        store.set(&key("3"), "https://c.com", &owner("u1")).await.unwrap();
        store.close().await.unwrap();

        let reopened = FileStore::open(log_path(&dir)).await.unwrap();
        assert_eq!(reopened.get(&key("3")).await.unwrap(), "https://c.com");
    }

    #[tokio::test]
    async fn complete_record_missing_newline_is_kept() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            log_path(&dir),
            "{\"id\":\"1\",\"url\":\"https://a.com\",\"user_id\":\"u1\"}",
        )
        .unwrap();

        let store = FileStore::open(log_path(&dir)).await.unwrap();
        store.set(&key("2"), "https://b.com", &owner("u1")).await.unwrap();
        store.close().await.unwrap();

        let reopened = FileStore::open(log_path(&dir)).await.unwrap();
        assert_eq!(reopened.get(&key("1")).await.unwrap(), "https://a.com");
        assert_eq!(reopened.get(&key("2")).await.unwrap(), "https://b.com");
    }

    #[tokio::test]
    async fn closed_store_rejects_operations() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(log_path(&dir)).await.unwrap();

        store.close().await.unwrap();
        store.close().await.unwrap();

        assert!(matches!(
            store.get(&key("1")).await.unwrap_err(),
            StoreError::Unavailable(_)
        ));
        assert!(matches!(
            store
                .set(&key("1"), "https://a.com", &owner("u1"))
                .await
                .unwrap_err(),
            StoreError::Unavailable(_)
        ));
    }

    #[test]
    fn replay_skips_blank_lines() {
        let bytes = b"\n{\"id\":\"1\",\"url\":\"https://a.com\",\"user_id\":\"u1\"}\n\n";
        let replay = replay(bytes).unwrap();

        assert_eq!(replay.index.len(), 1);
        assert_eq!(replay.committed_len, bytes.len());
        assert!(!replay.missing_newline);
    }
}
