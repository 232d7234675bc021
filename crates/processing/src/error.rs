use thiserror::Error;

/// Non-fatal, per-row failure surfaced by the reconciler. Never aborts the
/// batch; the worker folds it into the `failed` counter and moves on.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("lookup failed for part_number {part_number}: {source}")]
    Lookup {
        part_number: String,
        #[source]
        source: connectors::error::RemoteError,
    },

    #[error("fetch failed for remote id {remote_id}: {source}")]
    Fetch {
        remote_id: String,
        #[source]
        source: connectors::error::RemoteError,
    },
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("malformed job for feed {feed_key}: {reason}")]
    MalformedJob { feed_key: String, reason: String },

    #[error("bulk update failed: {0}")]
    Remote(#[from] connectors::error::RemoteError),

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] catalog_core::error::CheckpointError),

    #[error("queue error: {0}")]
    Queue(#[from] catalog_core::error::QueueError),
}
