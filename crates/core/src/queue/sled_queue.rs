use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use model::BatchJob;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{trace, warn};

use super::{JobEvent, JobOptions, JobQueue, JobState, LeasedJob};
use crate::error::QueueError;

#[derive(Debug, Serialize, Deserialize)]
struct StoredJob {
    job: BatchJob,
    attempt: u32,
    max_attempts: u32,
    backoff_base_ms: u64,
    visibility_timeout_ms: u64,
    visible_at_ms: u64,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Durable [`JobQueue`] backed by three `sled` trees: `pending` (jobs
/// waiting for or leased to a consumer), `completed`, and `failed`
/// (terminal, attempts-exhausted). A job id landing in either `completed`
/// or `failed` is never reprocessed even if `enqueue` is replayed after a
/// restart.
pub struct SledJobQueue {
    pending: sled::Tree,
    completed: sled::Tree,
    failed: sled::Tree,
    events: broadcast::Sender<JobEvent>,
}

impl SledJobQueue {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, QueueError> {
        let db = sled::open(path).map_err(|e| QueueError::Backend(e.to_string()))?;
        let pending = db
            .open_tree("pending")
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        let completed = db
            .open_tree("completed")
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        let failed = db
            .open_tree("failed")
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        let (events, _rx) = broadcast::channel(1024);

        Ok(SledJobQueue {
            pending,
            completed,
            failed,
            events,
        })
    }

    fn emit(&self, job_id: &str, state: JobState) {
        let _ = self.events.send(JobEvent {
            job_id: job_id.to_string(),
            state,
        });
    }
}

#[async_trait]
impl JobQueue for SledJobQueue {
    async fn enqueue(&self, job: BatchJob, opts: JobOptions) -> Result<bool, QueueError> {
        let job_id = job.job_id();
        let job_id_for_event = job_id.clone();
        let pending = self.pending.clone();
        let completed = self.completed.clone();
        let failed = self.failed.clone();

        let inserted = tokio::task::spawn_blocking(move || -> Result<bool, QueueError> {
            if completed
                .contains_key(&job_id)
                .map_err(|e| QueueError::Backend(e.to_string()))?
                || failed
                    .contains_key(&job_id)
                    .map_err(|e| QueueError::Backend(e.to_string()))?
                || pending
                    .contains_key(&job_id)
                    .map_err(|e| QueueError::Backend(e.to_string()))?
            {
                return Ok(false);
            }

            let stored = StoredJob {
                job,
                attempt: 0,
                max_attempts: opts.max_attempts,
                backoff_base_ms: opts.initial_backoff.as_millis() as u64,
                visibility_timeout_ms: opts.visibility_timeout.as_millis() as u64,
                visible_at_ms: now_ms(),
            };
            let bytes = bincode::serialize(&stored).map_err(|e| QueueError::Malformed(e.to_string()))?;
            pending
                .insert(job_id.as_bytes(), bytes)
                .map_err(|e| QueueError::Backend(e.to_string()))?;
            Ok(true)
        })
        .await
        .map_err(|e| QueueError::Backend(e.to_string()))??;

        if inserted {
            self.emit(&job_id_for_event, JobState::Waiting);
        }
        Ok(inserted)
    }

    async fn dequeue(&self) -> Result<Option<LeasedJob>, QueueError> {
        let pending = self.pending.clone();
        let events = self.events.clone();

        let result = tokio::task::spawn_blocking(move || -> Result<Option<(String, StoredJob)>, QueueError> {
            let now = now_ms();
            for item in pending.iter() {
                let (key, value) = item.map_err(|e| QueueError::Backend(e.to_string()))?;
                let stored: StoredJob =
                    bincode::deserialize(&value).map_err(|e| QueueError::Malformed(e.to_string()))?;
                if stored.visible_at_ms > now {
                    continue;
                }

                let leased = StoredJob {
                    attempt: stored.attempt + 1,
                    visible_at_ms: now + stored.visibility_timeout_ms,
                    ..stored
                };
                let new_bytes =
                    bincode::serialize(&leased).map_err(|e| QueueError::Malformed(e.to_string()))?;
                let cas = pending.compare_and_swap(&key, Some(value.as_ref()), Some(new_bytes));
                match cas {
                    Ok(Ok(())) => {
                        let job_id = String::from_utf8_lossy(&key).to_string();
                        return Ok(Some((job_id, leased)));
                    }
                    // Lost the race to another consumer; move on to the next candidate.
                    Ok(Err(_)) => continue,
                    Err(e) => return Err(QueueError::Backend(e.to_string())),
                }
            }
            Ok(None)
        })
        .await
        .map_err(|e| QueueError::Backend(e.to_string()))??;

        match result {
            Some((job_id, stored)) => {
                let _ = events.send(JobEvent {
                    job_id: job_id.clone(),
                    state: JobState::Active,
                });
                trace!(job_id = %job_id, attempt = stored.attempt, "dequeued job");
                Ok(Some(LeasedJob {
                    job: stored.job,
                    attempt: stored.attempt,
                }))
            }
            None => Ok(None),
        }
    }

    async fn ack(&self, job_id: &str) -> Result<(), QueueError> {
        let pending = self.pending.clone();
        let completed = self.completed.clone();
        let job_id = job_id.to_string();

        tokio::task::spawn_blocking(move || -> Result<(), QueueError> {
            pending
                .remove(job_id.as_bytes())
                .map_err(|e| QueueError::Backend(e.to_string()))?;
            completed
                .insert(job_id.as_bytes(), &[])
                .map_err(|e| QueueError::Backend(e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| QueueError::Backend(e.to_string()))??;

        self.emit(&job_id, JobState::Completed);
        Ok(())
    }

    async fn nack(&self, job_id: &str, reason: &str) -> Result<(), QueueError> {
        let pending = self.pending.clone();
        let failed = self.failed.clone();
        let job_id_owned = job_id.to_string();
        let reason = reason.to_string();

        let exhausted = tokio::task::spawn_blocking(move || -> Result<bool, QueueError> {
            let bytes = pending
                .get(job_id_owned.as_bytes())
                .map_err(|e| QueueError::Backend(e.to_string()))?
                .ok_or_else(|| QueueError::Malformed(format!("no leased job {job_id_owned}")))?;
            let stored: StoredJob =
                bincode::deserialize(&bytes).map_err(|e| QueueError::Malformed(e.to_string()))?;

            if stored.attempt >= stored.max_attempts {
                pending
                    .remove(job_id_owned.as_bytes())
                    .map_err(|e| QueueError::Backend(e.to_string()))?;
                failed
                    .insert(job_id_owned.as_bytes(), &[])
                    .map_err(|e| QueueError::Backend(e.to_string()))?;
                warn!(job_id = %job_id_owned, reason = %reason, "job attempts exhausted, marked failed");
                return Ok(true);
            }

            let delay_ms = stored
                .backoff_base_ms
                .saturating_mul(1u64 << stored.attempt.min(10));
            let retried = StoredJob {
                visible_at_ms: now_ms() + delay_ms,
                ..stored
            };
            let new_bytes =
                bincode::serialize(&retried).map_err(|e| QueueError::Malformed(e.to_string()))?;
            pending
                .insert(job_id_owned.as_bytes(), new_bytes)
                .map_err(|e| QueueError::Backend(e.to_string()))?;
            Ok(false)
        })
        .await
        .map_err(|e| QueueError::Backend(e.to_string()))??;

        if exhausted {
            self.emit(job_id, JobState::Failed);
            Err(QueueError::AttemptsExhausted(job_id.to_string()))
        } else {
            self.emit(job_id, JobState::Waiting);
            Ok(())
        }
    }

    async fn fail(&self, job_id: &str, reason: &str) -> Result<(), QueueError> {
        let pending = self.pending.clone();
        let failed = self.failed.clone();
        let job_id_owned = job_id.to_string();
        let reason = reason.to_string();

        tokio::task::spawn_blocking(move || -> Result<(), QueueError> {
            pending
                .remove(job_id_owned.as_bytes())
                .map_err(|e| QueueError::Backend(e.to_string()))?;
            failed
                .insert(job_id_owned.as_bytes(), &[])
                .map_err(|e| QueueError::Backend(e.to_string()))?;
            warn!(job_id = %job_id_owned, reason = %reason, "job marked failed without retry");
            Ok(())
        })
        .await
        .map_err(|e| QueueError::Backend(e.to_string()))??;

        self.emit(job_id, JobState::Failed);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::Row;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn job(feed_key: &str, last_row_index: u64) -> BatchJob {
        let headers: Arc<[String]> = Arc::from(vec!["part_number".to_string()]);
        let row = Row::new(headers, vec!["X-1".to_string()]);
        BatchJob::new(feed_key.to_string(), vec![row], 100, last_row_index)
    }

    #[tokio::test]
    async fn duplicate_enqueue_is_suppressed() {
        let dir = tempdir().unwrap();
        let queue = SledJobQueue::open(dir.path()).unwrap();

        let first = queue.enqueue(job("feed-a", 10), JobOptions::default()).await.unwrap();
        let second = queue.enqueue(job("feed-a", 10), JobOptions::default()).await.unwrap();
        assert!(first);
        assert!(!second);
    }

    #[tokio::test]
    async fn completed_job_id_rejects_replayed_enqueue() {
        let dir = tempdir().unwrap();
        let queue = SledJobQueue::open(dir.path()).unwrap();

        queue.enqueue(job("feed-a", 10), JobOptions::default()).await.unwrap();
        let leased = queue.dequeue().await.unwrap().unwrap();
        queue.ack(&leased.job.job_id()).await.unwrap();

        let replay = queue.enqueue(job("feed-a", 10), JobOptions::default()).await.unwrap();
        assert!(!replay);
    }

    #[tokio::test]
    async fn nack_retries_until_attempts_exhausted_then_fails() {
        let dir = tempdir().unwrap();
        let queue = SledJobQueue::open(dir.path()).unwrap();
        let opts = JobOptions {
            max_attempts: 2,
            initial_backoff: std::time::Duration::from_millis(0),
            visibility_timeout: std::time::Duration::from_millis(0),
        };

        queue.enqueue(job("feed-a", 10), opts).await.unwrap();
        let leased = queue.dequeue().await.unwrap().unwrap();
        let job_id = leased.job.job_id();

        queue.nack(&job_id, "transient").await.unwrap();
        let leased_again = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(leased_again.attempt, 2);

        let result = queue.nack(&job_id, "transient").await;
        assert!(matches!(result, Err(QueueError::AttemptsExhausted(_))));

        let replay = queue.enqueue(job("feed-a", 10), JobOptions::default()).await.unwrap();
        assert!(!replay, "a terminally failed job id must not be re-enqueued");
    }

    #[tokio::test]
    async fn fail_skips_remaining_attempts_and_blocks_replay() {
        let dir = tempdir().unwrap();
        let queue = SledJobQueue::open(dir.path()).unwrap();

        queue.enqueue(job("feed-a", 10), JobOptions::default()).await.unwrap();
        let leased = queue.dequeue().await.unwrap().unwrap();
        let job_id = leased.job.job_id();

        queue.fail(&job_id, "malformed").await.unwrap();

        let replay = queue.enqueue(job("feed-a", 10), JobOptions::default()).await.unwrap();
        assert!(!replay);
    }
}
