pub mod error;
pub mod ingest;
pub mod remote;

pub use error::{IngestError, RemoteError};
pub use ingest::{FeedIngestor, FsObjectStore, ObjectStore, is_csv_file};
pub use remote::{BulkUpdateOutcome, HttpRemoteCatalog, RemoteCatalog};
