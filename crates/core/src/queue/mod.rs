pub mod sled_queue;

use std::time::Duration;

use async_trait::async_trait;
use model::BatchJob;
use tokio::sync::broadcast;

use crate::error::QueueError;

pub use sled_queue::SledJobQueue;

/// State transitions a queued job passes through. Mirrors the lifecycle a
/// consumer observes from outside the queue, not its internal storage
/// representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Active,
    Waiting,
    Completed,
    Failed,
    Error,
}

#[derive(Debug, Clone)]
pub struct JobEvent {
    pub job_id: String,
    pub state: JobState,
}

#[derive(Debug, Clone)]
pub struct JobOptions {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub visibility_timeout: Duration,
}

impl Default for JobOptions {
    fn default() -> Self {
        JobOptions {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(5),
            visibility_timeout: Duration::from_secs(120),
        }
    }
}

/// A job handed out by [`JobQueue::dequeue`]; holds the lease's attempt
/// number so a caller's retry-aware error handling can report it in logs.
#[derive(Debug, Clone)]
pub struct LeasedJob {
    pub job: BatchJob,
    pub attempt: u32,
}

/// Durable, at-least-once queue of [`BatchJob`]s. Duplicate `enqueue` of the
/// same job id is suppressed against both the pending and the completed key
/// space, so replaying an already-committed job id after a restart is a
/// no-op.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Returns `true` if the job was newly enqueued, `false` if it was a
    /// duplicate of a pending or already-completed job id.
    async fn enqueue(&self, job: BatchJob, opts: JobOptions) -> Result<bool, QueueError>;

    /// Leases the next visible job, hiding it from other consumers until
    /// `ack`/`nack` or its visibility timeout expires. Best-effort FIFO;
    /// fairness across feeds is not guaranteed.
    async fn dequeue(&self) -> Result<Option<LeasedJob>, QueueError>;

    async fn ack(&self, job_id: &str) -> Result<(), QueueError>;

    /// Marks a leased job as failed for this attempt. Re-enqueues with
    /// exponential backoff if attempts remain, or transitions it to the
    /// terminal `Failed` state once `max_attempts` is exhausted.
    async fn nack(&self, job_id: &str, reason: &str) -> Result<(), QueueError>;

    /// Moves a leased job straight to the terminal `Failed` state, skipping
    /// any remaining retry attempts. For jobs that are malformed rather
    /// than transiently failing -- retrying would just repeat the same
    /// validation error.
    async fn fail(&self, job_id: &str, reason: &str) -> Result<(), QueueError>;

    fn subscribe(&self) -> broadcast::Receiver<JobEvent>;
}
