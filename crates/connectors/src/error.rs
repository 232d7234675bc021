use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("object store error fetching {bucket}/{key}: {source}")]
    ObjectFetch {
        bucket: String,
        key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("feed body is not valid UTF-8: {0}")]
    InvalidEncoding(#[from] std::str::Utf8Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("feed {feed_key} is missing a header row")]
    MissingHeader { feed_key: String },

    #[error("aborting ingest for {feed_key} after {count} consecutive row errors")]
    TooManyRowErrors { feed_key: String, count: u32 },

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] catalog_core::error::CheckpointError),

    #[error("queue error: {0}")]
    Queue(#[from] catalog_core::error::QueueError),
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("lookup failed for part_number {part_number}: {source}")]
    LookupFailed {
        part_number: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("fetch failed for remote id {remote_id}: {source}")]
    FetchFailed {
        remote_id: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("bulk update failed for {} payload(s) after retries: {}", .failed.len(), .failed.iter().map(|f| f.remote_id.as_str()).collect::<Vec<_>>().join(", "))]
    BulkFailed { failed: Vec<FailedUpdate> },

    #[error("unexpected remote response: {0}")]
    UnexpectedResponse(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedUpdate {
    pub part_number: String,
    pub remote_id: String,
}

impl RemoteError {
    /// Transient per the classifier named for the remote collaborator:
    /// HTTP 429/502/504/524, connection reset, or a request-level timeout.
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::LookupFailed { source, .. } | RemoteError::FetchFailed { source, .. } => {
                is_transient_reqwest_error(source)
            }
            RemoteError::BulkFailed { .. } => false,
            RemoteError::UnexpectedResponse(_) => false,
        }
    }
}

pub(crate) fn is_transient_reqwest_error(err: &reqwest::Error) -> bool {
    if err.is_timeout() || err.is_connect() {
        return true;
    }
    matches!(
        err.status().map(|s| s.as_u16()),
        Some(429) | Some(502) | Some(504) | Some(524)
    )
}
