use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use super::object_store::ObjectStore;
use crate::error::IngestError;

/// Local-filesystem [`ObjectStore`]: `bucket` is a root directory and
/// `prefix` a relative subdirectory within it. Used for development and
/// for driving the pipeline against a mounted volume instead of a concrete
/// cloud SDK, which stays out of scope for this crate.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsObjectStore { root: root.into() }
    }

    fn bucket_path(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    /// Lists immediate entries under `bucket/prefix`, returned as keys
    /// relative to the bucket root. Used both to enumerate date folders
    /// (when `prefix` is empty) and to enumerate `.csv` files within a
    /// selected folder.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, IngestError> {
        let dir = self.bucket_path(bucket).join(prefix);
        let mut entries = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&dir)
            .await
            .map_err(|source| fetch_error(bucket, prefix, source))?;

        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|source| fetch_error(bucket, prefix, source))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            let key = if prefix.is_empty() {
                name
            } else {
                format!("{}/{}", prefix.trim_end_matches('/'), name)
            };
            entries.push(key);
        }

        Ok(entries)
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes, IngestError> {
        let path = self.bucket_path(bucket).join(key);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|source| fetch_error(bucket, key, source))?;
        Ok(Bytes::from(bytes))
    }
}

fn fetch_error(bucket: &str, key: &str, source: std::io::Error) -> IngestError {
    IngestError::ObjectFetch {
        bucket: bucket.to_string(),
        key: key.to_string(),
        source: Box::new(source),
    }
}

/// True if `name` ends in a case-insensitive `.csv` extension.
pub fn is_csv_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn lists_and_reads_back_a_file() {
        let dir = tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("bucket/07-30-2026")).await.unwrap();
        tokio::fs::write(dir.path().join("bucket/07-30-2026/feed.csv"), b"part_number\nX-1\n")
            .await
            .unwrap();

        let store = FsObjectStore::new(dir.path());
        let folders = store.list("bucket", "").await.unwrap();
        assert_eq!(folders, vec!["07-30-2026".to_string()]);

        let files = store.list("bucket", "07-30-2026").await.unwrap();
        assert_eq!(files, vec!["07-30-2026/feed.csv".to_string()]);

        let body = store.get("bucket", &files[0]).await.unwrap();
        assert_eq!(&body[..], b"part_number\nX-1\n");
    }

    #[test]
    fn is_csv_file_is_case_insensitive() {
        assert!(is_csv_file("feed.csv"));
        assert!(is_csv_file("FEED.CSV"));
        assert!(!is_csv_file("feed.txt"));
        assert!(!is_csv_file("feed"));
    }
}
