mod feed_ingestor;
mod fs_object_store;
mod object_store;

pub use feed_ingestor::FeedIngestor;
pub use fs_object_store::{FsObjectStore, is_csv_file};
pub use object_store::ObjectStore;
