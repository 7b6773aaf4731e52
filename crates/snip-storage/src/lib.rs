//! Storage backends for the snip URL shortener.
//!
//! Three implementations of [`RecordStore`] are provided, selected at
//! construction time through [`StoreConfig`] and [`open`]:
//!
//! - [`InMemoryStore`]: a concurrent map, nothing persisted
//! - [`FileStore`]: an append-only JSON Lines log replayed at startup
//! - [`PostgresStore`]: a single `urls` table with ordered migrations

pub mod backend;
pub mod file;
pub mod memory;
pub mod postgres;

pub use backend::{open, StoreConfig};
pub use file::FileStore;
pub use memory::InMemoryStore;
pub use postgres::{PostgresConfig, PostgresStore};
pub use snip_core::{OwnerId, RecordStore, Result, ShortKey, Stats, StoreError};
