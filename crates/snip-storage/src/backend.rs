use crate::file::FileStore;
use crate::memory::InMemoryStore;
use crate::postgres::{PostgresConfig, PostgresStore};
use snip_core::{RecordStore, Result};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Which backend to construct, and how.
#[derive(Debug, Clone)]
pub enum StoreConfig {
    InMemory,
    File { path: PathBuf },
    Postgres(PostgresConfig),
}

impl Display for StoreConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreConfig::InMemory => write!(f, "in-memory"),
            StoreConfig::File { path } => write!(f, "file({})", path.display()),
            StoreConfig::Postgres(_) => write!(f, "postgres"),
        }
    }
}

/// Constructs the configured backend behind the [`RecordStore`] trait.
///
/// Initialization failures (unreadable or corrupt log, unreachable
/// database, failed migration) are returned to the caller, which is
/// expected to abort startup.
pub async fn open(config: &StoreConfig) -> Result<Arc<dyn RecordStore>> {
    let store: Arc<dyn RecordStore> = match config {
        StoreConfig::InMemory => Arc::new(InMemoryStore::new()),
        StoreConfig::File { path } => Arc::new(FileStore::open(path).await?),
        StoreConfig::Postgres(config) => Arc::new(PostgresStore::connect(config).await?),
    };

    info!(backend = %config, "record store ready");
    Ok(store)
}
