//! URL shortener service for snip.
//!
//! This crate wires a [`Deriver`](snip_core::Deriver) and a
//! [`RecordStore`](snip_core::RecordStore) into the [`ShortenerService`]
//! facade and provides the [`DeletionPipeline`] that soft-deletes batches
//! of keys in the background.

pub mod error;
pub mod pipeline;
pub mod service;

pub use error::ShortenerError;
pub use pipeline::{BatchReport, DeleteOutcome, DeletionPipeline, PipelineSettings};
pub use service::{
    BatchItem, BatchShortened, OwnedLink, ServiceConfig, Shortened, ShortenerService,
};
