pub mod json_store;

use async_trait::async_trait;
use model::{Checkpoint, CounterKind, Counters};

use crate::error::CheckpointError;

pub use json_store::JsonCheckpointStore;

/// Snapshot of one feed's durable progress, as returned by
/// [`CheckpointStore::read_all`].
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSnapshot {
    pub feed_key: String,
    pub checkpoint: Checkpoint,
    pub counters: Counters,
}

/// Persistent per-feed progress: the highest contiguously-acknowledged row
/// index plus outcome counters. Counter increments are individually atomic;
/// `commit_batch` is the only operation that must be durable immediately
/// (the checkpoint file is rewritten atomically on every call).
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn set_total(&self, feed_key: &str, total: u64) -> Result<(), CheckpointError>;

    async fn get_last_processed(&self, feed_key: &str) -> u64;

    async fn commit_batch(
        &self,
        feed_key: &str,
        new_last: u64,
        total: u64,
    ) -> Result<(), CheckpointError>;

    async fn increment_counter(&self, feed_key: &str, which: CounterKind, by: u64);

    async fn read_all(&self) -> Vec<FeedSnapshot>;
}
