pub mod checkpoint;
pub mod error;
pub mod metrics;
pub mod queue;
pub mod rategate;
pub mod retry;

pub use checkpoint::{CheckpointStore, FeedSnapshot, JsonCheckpointStore};
pub use metrics::{Metrics, MetricsSnapshot};
pub use queue::{JobEvent, JobOptions, JobQueue, JobState, LeasedJob, SledJobQueue};
pub use rategate::RateGate;
pub use retry::{RetryDisposition, RetryError, RetryPolicy};
