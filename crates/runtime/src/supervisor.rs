use std::sync::Arc;
use std::time::Duration;

use catalog_core::checkpoint::CheckpointStore;
use catalog_core::metrics::Metrics;
use catalog_core::queue::JobQueue;
use chrono::NaiveDate;
use connectors::{FeedIngestor, ObjectStore, RemoteCatalog, is_csv_file};
use processing::BatchWorker;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::RuntimeConfig;
use crate::error::SupervisorError;

const COMPLETION_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Orchestrates one run: discovers the newest feed folder, ingests every
/// CSV object within it concurrently, runs a worker pool against the
/// durable queue, and cancels everything once every discovered feed's
/// counters have caught up with its total.
pub struct Supervisor<O, C, Q, R> {
    object_store: Arc<O>,
    checkpoint: Arc<C>,
    queue: Arc<Q>,
    remote: Arc<R>,
    config: RuntimeConfig,
    metrics: Metrics,
}

impl<O, C, Q, R> Supervisor<O, C, Q, R>
where
    O: ObjectStore + 'static,
    C: CheckpointStore + 'static,
    Q: JobQueue + 'static,
    R: RemoteCatalog + 'static,
{
    pub fn new(object_store: Arc<O>, checkpoint: Arc<C>, queue: Arc<Q>, remote: Arc<R>, config: RuntimeConfig, metrics: Metrics) -> Self {
        Supervisor { object_store, checkpoint, queue, remote, config, metrics }
    }

    pub async fn run(&self, cancel: CancellationToken) -> Result<(), SupervisorError> {
        let folder = self.discover_newest_folder().await?;
        let feed_keys = self.list_csv_objects(&folder).await?;

        if feed_keys.is_empty() {
            warn!(folder, "no CSV objects found in newest feed folder");
            return Ok(());
        }
        info!(folder, count = feed_keys.len(), "discovered feed folder");

        let ingest_handles: Vec<_> = feed_keys
            .iter()
            .map(|feed_key| {
                let object_store = self.object_store.clone();
                let checkpoint = self.checkpoint.clone();
                let queue = self.queue.clone();
                let bucket = self.config.bucket_name.clone();
                let feed_key = feed_key.clone();
                let batch_size = self.config.batch_size;
                tokio::spawn(async move {
                    let ingestor = FeedIngestor::new(object_store, checkpoint, queue);
                    let result = ingestor.ingest(&bucket, &feed_key, &feed_key, batch_size).await;
                    (feed_key, result)
                })
            })
            .collect();

        let worker_handles: Vec<_> = (0..self.config.concurrency.max(1))
            .map(|_| {
                let worker = BatchWorker::new(self.remote.clone(), self.checkpoint.clone(), self.queue.clone(), self.metrics.clone());
                let cancel = cancel.clone();
                tokio::spawn(async move { worker.run(cancel).await })
            })
            .collect();

        let ticker = CompletionTicker::new(self.checkpoint.clone(), feed_keys.clone());
        let ticker_cancel = cancel.clone();
        let ticker_handle = tokio::spawn(async move { ticker.run(ticker_cancel).await });

        for handle in ingest_handles {
            match handle.await {
                Ok((feed_key, Ok(()))) => info!(feed_key, "ingest complete"),
                Ok((feed_key, Err(source))) => {
                    error!(feed_key, error = %source, "feed ingest failed");
                    return Err(SupervisorError::Ingest { feed_key, source });
                }
                Err(join_err) => error!(error = %join_err, "ingest task panicked"),
            }
        }

        for handle in worker_handles {
            if let Err(join_err) = handle.await {
                error!(error = %join_err, "worker task panicked");
            }
        }

        cancel.cancel();
        let _ = ticker_handle.await;

        let overall = crate::progress::ProgressService::new(self.checkpoint.clone()).overall_progress().await;
        info!(all_complete = overall.all_complete, feeds = overall.feeds.len(), "run finished, final progress flushed");

        Ok(())
    }

    async fn discover_newest_folder(&self) -> Result<String, SupervisorError> {
        let entries = self
            .object_store
            .list(&self.config.bucket_name, "")
            .await
            .map_err(|source| SupervisorError::ListFolders { bucket: self.config.bucket_name.clone(), source })?;

        let suffix = self.config.folder_suffix();
        entries
            .into_iter()
            .filter_map(|name| folder_date(&name, suffix).map(|date| (date, name)))
            .max_by_key(|(date, _)| *date)
            .map(|(_, name)| name)
            .ok_or_else(|| SupervisorError::NoFeedFolder { bucket: self.config.bucket_name.clone() })
    }

    async fn list_csv_objects(&self, folder: &str) -> Result<Vec<String>, SupervisorError> {
        let entries = self
            .object_store
            .list(&self.config.bucket_name, folder)
            .await
            .map_err(|source| SupervisorError::ListObjects { folder: folder.to_string(), source })?;

        Ok(entries.into_iter().filter(|key| is_csv_file(key)).collect())
    }
}

/// Parses a folder name against the mode's expected suffix, returning its
/// date if it matches. A production run never treats a `-test` folder as
/// a candidate even though its date prefix would otherwise parse.
fn folder_date(name: &str, suffix: &str) -> Option<NaiveDate> {
    let base = if suffix.is_empty() {
        if name.ends_with("-test") {
            return None;
        }
        name
    } else {
        name.strip_suffix(suffix)?
    };
    NaiveDate::parse_from_str(base, "%m-%d-%Y").ok()
}

/// Periodic completion scan, grounded in the same tick-scheduling idiom
/// as a hot-loop-free polling task: sleep for the interval, check, repeat,
/// with cancellation observed at every suspension point.
struct CompletionTicker<C> {
    checkpoint: Arc<C>,
    feed_keys: Vec<String>,
}

impl<C: CheckpointStore> CompletionTicker<C> {
    fn new(checkpoint: Arc<C>, feed_keys: Vec<String>) -> Self {
        CompletionTicker { checkpoint, feed_keys }
    }

    async fn run(&self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(COMPLETION_CHECK_INTERVAL) => {}
            }

            if self.all_feeds_complete().await {
                info!("all discovered feeds complete, signalling shutdown");
                cancel.cancel();
                return;
            }
        }
    }

    async fn all_feeds_complete(&self) -> bool {
        let snapshots = self.checkpoint.read_all().await;
        self.feed_keys.iter().all(|feed_key| {
            snapshots
                .iter()
                .find(|snapshot| &snapshot.feed_key == feed_key)
                .map(|snapshot| snapshot.counters.is_complete())
                .unwrap_or(false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_folder_date_rejects_test_suffix() {
        assert!(folder_date("07-30-2026", "").is_some());
        assert!(folder_date("07-30-2026-test", "").is_none());
    }

    #[test]
    fn development_folder_date_requires_test_suffix() {
        assert_eq!(folder_date("07-30-2026-test", "-test"), NaiveDate::from_ymd_opt(2026, 7, 30));
        assert!(folder_date("07-30-2026", "-test").is_none());
    }

    #[test]
    fn malformed_folder_name_is_ignored() {
        assert!(folder_date("not-a-date", "").is_none());
    }
}
