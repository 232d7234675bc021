use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to list feed folders in bucket {bucket}: {source}")]
    ListFolders {
        bucket: String,
        #[source]
        source: connectors::IngestError,
    },

    #[error("no feed folder found in bucket {bucket}")]
    NoFeedFolder { bucket: String },

    #[error("failed to list CSV objects in folder {folder}: {source}")]
    ListObjects {
        folder: String,
        #[source]
        source: connectors::IngestError,
    },

    #[error("ingest failed for feed {feed_key}: {source}")]
    Ingest {
        feed_key: String,
        #[source]
        source: connectors::IngestError,
    },

    #[error(transparent)]
    Checkpoint(#[from] catalog_core::error::CheckpointError),

    #[error(transparent)]
    Queue(#[from] catalog_core::error::QueueError),

    #[error("invalid configuration: {0}")]
    Config(String),
}
