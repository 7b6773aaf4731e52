//! Batch soft-deletion through a fixed pool of worker lanes.
//!
//! A batch flows through four stages connected by bounded channels:
//!
//! 1. a producer turns the submitted keys into [`DeleteItem`]s,
//! 2. a fan-out stage deals the items round-robin onto `workers` lanes,
//! 3. every lane calls [`RecordStore::delete`] for its items one at a time,
//! 4. a fan-in stage merges the lane outputs into a single stream that a
//!    collector drains, logs and tallies into a [`BatchReport`].
//!
//! Outcomes arrive in no particular order across lanes. A submitted batch
//! always runs to completion; failed items are logged and counted, never
//! retried.

use jiff::{SignedDuration, Timestamp};
use serde::Serialize;
use snip_core::{OwnerId, RecordStore, ShortKey, StoreError};
use std::sync::Arc;
use tokio::sync::mpsc::{self, Receiver};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use typed_builder::TypedBuilder;

pub const DEFAULT_WORKERS: usize = 10;

#[derive(Debug, Clone, TypedBuilder)]
pub struct PipelineSettings {
    /// Number of worker lanes. Zero is treated as one.
    #[builder(default = DEFAULT_WORKERS)]
    workers: usize,
    /// Buffer size of every stage channel. Zero is treated as one.
    #[builder(default = 1)]
    lane_capacity: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl PipelineSettings {
    pub fn workers(&self) -> usize {
        self.workers.max(1)
    }

    pub fn lane_capacity(&self) -> usize {
        self.lane_capacity.max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteItem {
    pub key: ShortKey,
    pub owner: OwnerId,
}

/// Result of one delete attempt, tagged with the lane that ran it.
#[derive(Debug, Clone)]
pub struct DeleteOutcome {
    pub key: ShortKey,
    pub owner: OwnerId,
    pub lane: usize,
    pub result: Result<(), StoreError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub submitted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
}

impl BatchReport {
    pub fn elapsed(&self) -> SignedDuration {
        self.finished_at.duration_since(self.started_at)
    }
}

#[derive(Clone)]
pub struct DeletionPipeline {
    store: Arc<dyn RecordStore>,
    settings: PipelineSettings,
}

impl DeletionPipeline {
    pub fn new(store: Arc<dyn RecordStore>, settings: PipelineSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Schedules the batch on the current tokio runtime and returns at once.
    ///
    /// The returned handle may be dropped; the batch keeps running and its
    /// outcome is only visible in the logs.
    pub fn submit_batch(&self, keys: Vec<ShortKey>, owner: OwnerId) -> JoinHandle<BatchReport> {
        debug!(owner = %owner, keys = keys.len(), "delete batch accepted");
        let pipeline = self.clone();
        tokio::spawn(async move { pipeline.run_batch(keys, owner).await })
    }

    /// Runs the batch through every stage and waits until all lanes drain.
    pub async fn run_batch(&self, keys: Vec<ShortKey>, owner: OwnerId) -> BatchReport {
        let started_at = Timestamp::now();
        let submitted = keys.len();

        if keys.is_empty() {
            return BatchReport {
                submitted: 0,
                succeeded: 0,
                failed: 0,
                started_at,
                finished_at: started_at,
            };
        }

        let capacity = self.settings.lane_capacity();
        let source = produce(keys, owner.clone(), capacity);
        let lanes = fan_out(source, self.settings.workers(), capacity);
        let outputs = lanes
            .into_iter()
            .enumerate()
            .map(|(lane, items)| run_lane(lane, items, Arc::clone(&self.store), capacity))
            .collect();
        let mut merged = fan_in(outputs, capacity);

        let mut succeeded = 0;
        let mut failed = 0;
        while let Some(outcome) = merged.recv().await {
            match &outcome.result {
                Ok(()) => {
                    succeeded += 1;
                    trace!(key = %outcome.key, lane = outcome.lane, "deleted");
                }
                Err(err) => {
                    failed += 1;
                    warn!(
                        key = %outcome.key,
                        owner = %outcome.owner,
                        lane = outcome.lane,
                        error = %err,
                        "failed to delete record"
                    );
                }
            }
        }

        let report = BatchReport {
            submitted,
            succeeded,
            failed,
            started_at,
            finished_at: Timestamp::now(),
        };

        info!(
            owner = %owner,
            submitted = report.submitted,
            succeeded = report.succeeded,
            failed = report.failed,
            elapsed = ?report.elapsed(),
            "delete batch finished"
        );
        report
    }
}

fn produce(keys: Vec<ShortKey>, owner: OwnerId, capacity: usize) -> Receiver<DeleteItem> {
    let (tx, rx) = mpsc::channel(capacity);

    tokio::spawn(async move {
        for key in keys {
            let item = DeleteItem {
                key,
                owner: owner.clone(),
            };
            if tx.send(item).await.is_err() {
                break;
            }
        }
    });

    rx
}

fn fan_out(
    mut source: Receiver<DeleteItem>,
    workers: usize,
    capacity: usize,
) -> Vec<Receiver<DeleteItem>> {
    let (senders, receivers): (Vec<_>, Vec<_>) =
        (0..workers).map(|_| mpsc::channel(capacity)).unzip();

    tokio::spawn(async move {
        let mut next = 0;
        while let Some(item) = source.recv().await {
            if let Err(err) = senders[next].send(item).await {
                warn!(lane = next, key = %err.0.key, "lane closed before the batch drained");
                break;
            }
            next = (next + 1) % senders.len();
        }
    });

    receivers
}

fn run_lane(
    lane: usize,
    mut items: Receiver<DeleteItem>,
    store: Arc<dyn RecordStore>,
    capacity: usize,
) -> Receiver<DeleteOutcome> {
    let (tx, rx) = mpsc::channel(capacity);

    tokio::spawn(async move {
        while let Some(DeleteItem { key, owner }) = items.recv().await {
            let result = store.delete(&key, &owner).await;
            let outcome = DeleteOutcome {
                key,
                owner,
                lane,
                result,
            };
            if tx.send(outcome).await.is_err() {
                break;
            }
        }
    });

    rx
}

fn fan_in(lanes: Vec<Receiver<DeleteOutcome>>, capacity: usize) -> Receiver<DeleteOutcome> {
    let (tx, rx) = mpsc::channel(capacity);

    for mut lane in lanes {
        let tx = tx.clone();
        tokio::spawn(async move {
            while let Some(outcome) = lane.recv().await {
                if tx.send(outcome).await.is_err() {
                    break;
                }
            }
        });
    }

    // the merged stream closes once every forwarder has dropped its sender
    rx
}
