use std::sync::Arc;
use std::time::Duration;

use catalog_core::checkpoint::CheckpointStore;
use catalog_core::metrics::Metrics;
use catalog_core::queue::{JobQueue, LeasedJob};
use connectors::RemoteCatalog;
use model::CounterKind;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::WorkerError;
use crate::reconciler::{FailReason, Outcome, Reconciler, SkipReason};

const IDLE_DELAY: Duration = Duration::from_millis(100);

/// Outcome of reconciling and committing one `BatchJob`. Workers run this
/// loop concurrently; the only shared mutable state they touch is the
/// queue, the `RemoteCatalog`'s `RateGate`, and the per-feed checkpoint,
/// all of which mediate their own concurrency.
pub struct BatchWorker<R, C, Q> {
    remote: Arc<R>,
    checkpoint: Arc<C>,
    queue: Arc<Q>,
    reconciler: Reconciler<R>,
    metrics: Metrics,
}

impl<R, C, Q> BatchWorker<R, C, Q>
where
    R: RemoteCatalog,
    C: CheckpointStore,
    Q: JobQueue,
{
    pub fn new(remote: Arc<R>, checkpoint: Arc<C>, queue: Arc<Q>, metrics: Metrics) -> Self {
        BatchWorker {
            reconciler: Reconciler::new(remote.clone()),
            remote,
            checkpoint,
            queue,
            metrics,
        }
    }

    /// Runs until `cancel` fires. Dequeues one job at a time; an idle
    /// queue is polled on [`IDLE_DELAY`], never a hot loop.
    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            if cancel.is_cancelled() {
                info!("worker stopping on cancellation");
                return;
            }

            match self.queue.dequeue().await {
                Ok(Some(leased)) => self.handle(leased, &cancel).await,
                Ok(None) => {
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(IDLE_DELAY) => {}
                    }
                }
                Err(err) => {
                    error!(error = %err, "queue dequeue failed");
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(IDLE_DELAY) => {}
                    }
                }
            }
        }
    }

    async fn handle(&self, leased: LeasedJob, cancel: &CancellationToken) {
        let job_id = leased.job.job_id();
        match self.process(&leased, cancel).await {
            Ok(()) => {
                if let Err(err) = self.queue.ack(&job_id).await {
                    error!(job_id = %job_id, error = %err, "failed to ack completed job");
                }
            }
            Err(WorkerError::MalformedJob { feed_key, reason }) => {
                warn!(job_id = %job_id, feed_key = %feed_key, reason = %reason, "malformed job, failing without retry");
                if let Err(err) = self.queue.fail(&job_id, &reason).await {
                    error!(job_id = %job_id, error = %err, "failed to mark malformed job failed");
                }
            }
            Err(err) => {
                self.metrics.increment_retries(1);
                warn!(job_id = %job_id, error = %err, "job attempt failed, returning to queue");
                if let Err(nack_err) = self.queue.nack(&job_id, &err.to_string()).await {
                    self.metrics.increment_failures(1);
                    error!(job_id = %job_id, error = %nack_err, "job permanently failed after exhausting attempts");
                }
            }
        }
    }

    async fn process(&self, leased: &LeasedJob, cancel: &CancellationToken) -> Result<(), WorkerError> {
        let job = &leased.job;

        if job.feed_key.trim().is_empty() {
            return Err(WorkerError::MalformedJob {
                feed_key: job.feed_key.clone(),
                reason: "empty feed_key".to_string(),
            });
        }
        if job.batch.is_empty() {
            return Err(WorkerError::MalformedJob {
                feed_key: job.feed_key.clone(),
                reason: "empty batch".to_string(),
            });
        }

        let outcomes = futures::future::join_all(
            job.batch.iter().map(|row| self.reconciler.reconcile(row, cancel)),
        )
        .await;

        let mut payloads = Vec::new();
        let mut skipped = 0u64;
        let mut failed = 0u64;
        for outcome in outcomes {
            match outcome {
                // A missing part_number counts as failed, not skipped --
                // see the canonicalized counter accounting.
                Outcome::Skip(SkipReason::MissingPart) => failed += 1,
                Outcome::Fail(FailReason::NotFound | FailReason::Lookup | FailReason::Fetch) => failed += 1,
                Outcome::NoChange => skipped += 1,
                Outcome::Update(payload) => payloads.push(payload),
            }
        }

        let mut updated = 0u64;
        if !payloads.is_empty() {
            let outcomes = self
                .remote
                .bulk_update(payloads, cancel)
                .await
                .map_err(WorkerError::from)?;
            for outcome in outcomes {
                if outcome.success {
                    updated += 1;
                } else {
                    failed += 1;
                }
            }
        }

        if updated > 0 {
            self.checkpoint
                .increment_counter(&job.feed_key, CounterKind::Updated, updated)
                .await;
        }
        if skipped > 0 {
            self.checkpoint
                .increment_counter(&job.feed_key, CounterKind::Skipped, skipped)
                .await;
        }
        if failed > 0 {
            self.checkpoint
                .increment_counter(&job.feed_key, CounterKind::Failed, failed)
                .await;
        }

        // `last_row_index` is the batch's own absolute upper bound, not a
        // running tally -- advancing by it (rather than by
        // `last_processed + batch.len()`) is what keeps the checkpoint
        // correct when workers finish out of row order.
        self.checkpoint
            .commit_batch(&job.feed_key, job.last_row_index, job.total_rows_in_feed)
            .await?;
        self.metrics.increment_batches_completed(1);

        info!(
            feed_key = %job.feed_key,
            last_row_index = job.last_row_index,
            updated,
            skipped,
            failed,
            "batch committed"
        );

        Ok(())
    }
}
