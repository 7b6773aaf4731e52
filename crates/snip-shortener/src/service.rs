use crate::error::ShortenerError;
use crate::pipeline::{BatchReport, DeletionPipeline, PipelineSettings};
use serde::{Deserialize, Serialize};
use snip_core::{Deriver, OwnerId, RecordStore, ShortKey, Stats, Xxh32Deriver};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use typed_builder::TypedBuilder;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

#[derive(Debug, Clone, TypedBuilder)]
pub struct ServiceConfig {
    /// Prefix of every rendered short URL.
    #[builder(default = DEFAULT_BASE_URL.to_string(), setter(into))]
    pub base_url: String,
    #[builder(default)]
    pub pipeline: PipelineSettings,
}

/// A URL that was stored (or was already stored) under its derived key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shortened {
    pub key: ShortKey,
    pub short_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BatchItem {
    pub correlation_id: String,
    pub original_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchShortened {
    pub correlation_id: String,
    pub key: ShortKey,
    pub short_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnedLink {
    pub key: ShortKey,
    pub short_url: String,
    pub original_url: String,
}

/// Entry point for everything a transport layer needs: shortening,
/// resolution, listing, batch deletion and stats.
///
/// Keys come from the [`Deriver`], so shortening the same URL twice is
/// idempotent. A different URL that lands on an occupied key is reported as
/// [`ShortenerError::Conflict`] carrying that key.
#[derive(Clone)]
pub struct ShortenerService<D = Xxh32Deriver> {
    store: Arc<dyn RecordStore>,
    deriver: Arc<D>,
    pipeline: DeletionPipeline,
    base_url: String,
}

impl<D: Deriver> ShortenerService<D> {
    pub fn new(store: Arc<dyn RecordStore>, deriver: D, config: ServiceConfig) -> Self {
        let pipeline = DeletionPipeline::new(Arc::clone(&store), config.pipeline);
        Self {
            store,
            deriver: Arc::new(deriver),
            pipeline,
            base_url: config.base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn validate_url(url: &str) -> Result<(), ShortenerError> {
        if url.trim().is_empty() {
            return Err(ShortenerError::InvalidUrl(
                "URL cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn shorten(
        &self,
        original_url: &str,
        owner: &OwnerId,
    ) -> Result<Shortened, ShortenerError> {
        Self::validate_url(original_url)?;

        let key = self.deriver.derive(original_url);
        self.store.set(&key, original_url, owner).await?;
        debug!(key = %key, owner = %owner, "url shortened");

        Ok(Shortened {
            short_url: key.to_url(&self.base_url),
            key,
        })
    }

    /// Shortens every item for one owner and returns the results ordered by
    /// correlation id.
    ///
    /// Input is validated up front. Storage stops at the first error, so
    /// items stored before it stay stored.
    pub async fn shorten_batch(
        &self,
        items: Vec<BatchItem>,
        owner: &OwnerId,
    ) -> Result<Vec<BatchShortened>, ShortenerError> {
        for item in &items {
            Self::validate_url(&item.original_url)?;
        }

        let mut shortened = Vec::with_capacity(items.len());
        for item in items {
            let key = self.deriver.derive(&item.original_url);
            self.store.set(&key, &item.original_url, owner).await?;
            shortened.push(BatchShortened {
                correlation_id: item.correlation_id,
                short_url: key.to_url(&self.base_url),
                key,
            });
        }

        shortened.sort_by(|a, b| a.correlation_id.cmp(&b.correlation_id));
        info!(owner = %owner, count = shortened.len(), "batch shortened");
        Ok(shortened)
    }

    pub async fn resolve(&self, key: &ShortKey) -> Result<String, ShortenerError> {
        Ok(self.store.get(key).await?)
    }

    /// Live links of one owner, ordered by key.
    pub async fn list_by_owner(&self, owner: &OwnerId) -> Result<Vec<OwnedLink>, ShortenerError> {
        let links = self
            .store
            .get_all_by_owner(owner)
            .await?
            .into_iter()
            .map(|(key, original_url)| OwnedLink {
                short_url: key.to_url(&self.base_url),
                key,
                original_url,
            })
            .collect();
        Ok(links)
    }

    /// Hands the keys to the deletion pipeline and returns without waiting.
    pub fn delete_batch(&self, keys: Vec<ShortKey>, owner: OwnerId) -> JoinHandle<BatchReport> {
        self.pipeline.submit_batch(keys, owner)
    }

    pub async fn stats(&self) -> Result<Stats, ShortenerError> {
        Ok(self.store.stats().await?)
    }

    pub async fn ping(&self) -> Result<(), ShortenerError> {
        Ok(self.store.ping().await?)
    }

    pub async fn close(&self) -> Result<(), ShortenerError> {
        Ok(self.store.close().await?)
    }
}
