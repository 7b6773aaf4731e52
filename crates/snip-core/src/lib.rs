//! Core types and traits for the snip URL shortener.
//!
//! This crate provides the short key type, the key deriver, the record
//! model and the [`RecordStore`] contract implemented by every storage
//! backend.

pub mod deriver;
pub mod error;
pub mod record;
pub mod short_key;
pub mod store;

pub use deriver::{Deriver, Xxh32Deriver};
pub use error::{Result, StoreError};
pub use record::{Record, Stats};
pub use short_key::{OwnerId, ShortKey};
pub use store::RecordStore;
