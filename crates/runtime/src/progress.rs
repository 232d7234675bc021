use std::sync::Arc;

use catalog_core::checkpoint::{CheckpointStore, FeedSnapshot};
use serde::Serialize;

/// Per-feed progress as reported to an operator: the durable checkpoint
/// plus a derived completion flag, never trusted as its own source of
/// truth -- it is recomputed from [`CheckpointStore::read_all`] on every
/// call.
#[derive(Debug, Clone, Serialize)]
pub struct FeedProgress {
    pub feed_key: String,
    pub last_processed_row: u64,
    pub total_rows: u64,
    pub updated: u64,
    pub skipped: u64,
    pub failed: u64,
    pub complete: bool,
}

impl From<FeedSnapshot> for FeedProgress {
    fn from(snapshot: FeedSnapshot) -> Self {
        FeedProgress {
            feed_key: snapshot.feed_key,
            last_processed_row: snapshot.checkpoint.last_processed_row,
            total_rows: snapshot.checkpoint.total_rows_in_feed,
            updated: snapshot.counters.updated,
            skipped: snapshot.counters.skipped,
            failed: snapshot.counters.failed,
            complete: snapshot.counters.is_complete(),
        }
    }
}

/// Aggregate progress across every feed discovered so far.
#[derive(Debug, Clone, Serialize)]
pub struct OverallProgress {
    pub feeds: Vec<FeedProgress>,
    pub all_complete: bool,
}

/// Read-only view over a [`CheckpointStore`] that turns raw snapshots
/// into operator-facing progress summaries. Holds no state of its own.
#[derive(Clone)]
pub struct ProgressService<C> {
    checkpoint: Arc<C>,
}

impl<C: CheckpointStore> ProgressService<C> {
    pub fn new(checkpoint: Arc<C>) -> Self {
        ProgressService { checkpoint }
    }

    pub async fn feed_progress(&self, feed_key: &str) -> Option<FeedProgress> {
        self.checkpoint
            .read_all()
            .await
            .into_iter()
            .find(|snapshot| snapshot.feed_key == feed_key)
            .map(FeedProgress::from)
    }

    pub async fn overall_progress(&self) -> OverallProgress {
        let feeds: Vec<FeedProgress> = self.checkpoint.read_all().await.into_iter().map(FeedProgress::from).collect();
        let all_complete = !feeds.is_empty() && feeds.iter().all(|f| f.complete);
        OverallProgress { feeds, all_complete }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::checkpoint::JsonCheckpointStore;
    use model::CounterKind;
    use tempfile::tempdir;

    #[tokio::test]
    async fn reports_incomplete_until_counters_reach_total() {
        let dir = tempdir().unwrap();
        let store = Arc::new(JsonCheckpointStore::open(dir.path().join("checkpoint.json")).await.unwrap());
        store.set_total("feed-a", 10).await.unwrap();
        store.increment_counter("feed-a", CounterKind::Updated, 4).await;
        store.commit_batch("feed-a", 4, 10).await.unwrap();

        let service = ProgressService::new(store.clone());
        let progress = service.feed_progress("feed-a").await.unwrap();
        assert_eq!(progress.updated, 4);
        assert!(!progress.complete);

        let overall = service.overall_progress().await;
        assert!(!overall.all_complete);
    }

    #[tokio::test]
    async fn all_complete_once_every_feed_is_saturated() {
        let dir = tempdir().unwrap();
        let store = Arc::new(JsonCheckpointStore::open(dir.path().join("checkpoint.json")).await.unwrap());
        store.set_total("feed-a", 2).await.unwrap();
        store.increment_counter("feed-a", CounterKind::Updated, 2).await;
        store.commit_batch("feed-a", 2, 2).await.unwrap();

        let service = ProgressService::new(store);
        let overall = service.overall_progress().await;
        assert!(overall.all_complete);
        assert!(overall.feeds[0].complete);
    }

    #[tokio::test]
    async fn unknown_feed_returns_none() {
        let dir = tempdir().unwrap();
        let store = Arc::new(JsonCheckpointStore::open(dir.path().join("checkpoint.json")).await.unwrap());
        let service = ProgressService::new(store);
        assert!(service.feed_progress("missing").await.is_none());
    }
}
