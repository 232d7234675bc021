use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("failed to read checkpoint file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write checkpoint file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize checkpoint state: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum RateGateError {
    #[error("cancelled while waiting for admission")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue backend error: {0}")]
    Backend(String),

    #[error("job {0} attempts exhausted")]
    AttemptsExhausted(String),

    #[error("malformed job: {0}")]
    Malformed(String),

    #[error("queue is shutting down")]
    ShuttingDown,
}
