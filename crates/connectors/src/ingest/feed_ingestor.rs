use std::sync::Arc;

use catalog_core::checkpoint::CheckpointStore;
use catalog_core::queue::{JobOptions, JobQueue};
use model::{BatchJob, Row};
use tracing::{info, warn};

use super::object_store::ObjectStore;
use crate::error::IngestError;

/// Streams one CSV object and emits [`BatchJob`]s onto the durable queue.
/// Operates over a single cached fetch of the body -- the two passes over
/// the CSV (count, then emit) re-read the in-memory bytes, never the
/// object store.
pub struct FeedIngestor<O, C, Q> {
    object_store: Arc<O>,
    checkpoint: Arc<C>,
    queue: Arc<Q>,
}

const MAX_CONSECUTIVE_ROW_ERRORS: u32 = 3;

impl<O, C, Q> FeedIngestor<O, C, Q>
where
    O: ObjectStore,
    C: CheckpointStore,
    Q: JobQueue,
{
    pub fn new(object_store: Arc<O>, checkpoint: Arc<C>, queue: Arc<Q>) -> Self {
        FeedIngestor {
            object_store,
            checkpoint,
            queue,
        }
    }

    pub async fn ingest(
        &self,
        bucket: &str,
        object_key: &str,
        feed_key: &str,
        batch_size: usize,
    ) -> Result<(), IngestError> {
        let body = self.object_store.get(bucket, object_key).await?;
        let text = std::str::from_utf8(&body)?;

        let total_rows = count_data_rows(text, feed_key)?;
        self.checkpoint.set_total(feed_key, total_rows).await?;
        info!(feed_key, total_rows, "ingest first pass complete");

        self.emit_batches(text, feed_key, batch_size, total_rows)
            .await
    }

    async fn emit_batches(
        &self,
        text: &str,
        feed_key: &str,
        batch_size: usize,
        total_rows: u64,
    ) -> Result<(), IngestError> {
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(text.as_bytes());
        let headers: Arc<[String]> = Arc::from(
            reader
                .headers()?
                .iter()
                .map(model::row::normalize_header)
                .collect::<Vec<_>>(),
        );

        let mut batch: Vec<Row> = Vec::with_capacity(batch_size);
        let mut rows_seen: u64 = 0;
        let mut consecutive_errors = 0u32;

        for record in reader.records() {
            match record {
                Ok(record) => {
                    consecutive_errors = 0;
                    let cells: Vec<String> = record.iter().map(str::to_string).collect();
                    let row = Row::new(headers.clone(), cells);
                    if row.missing_part_number() {
                        warn!(feed_key, rows_seen, "row missing part_number, passed through");
                    }
                    batch.push(row);
                    rows_seen += 1;

                    if batch.len() >= batch_size {
                        self.enqueue_batch(feed_key, std::mem::take(&mut batch), total_rows, rows_seen)
                            .await?;
                    }
                }
                Err(err) => {
                    consecutive_errors += 1;
                    warn!(feed_key, error = %err, consecutive_errors, "row parse error");
                    if consecutive_errors >= MAX_CONSECUTIVE_ROW_ERRORS {
                        return Err(IngestError::TooManyRowErrors {
                            feed_key: feed_key.to_string(),
                            count: consecutive_errors,
                        });
                    }
                }
            }
        }

        if !batch.is_empty() {
            self.enqueue_batch(feed_key, batch, total_rows, rows_seen).await?;
        }

        Ok(())
    }

    async fn enqueue_batch(
        &self,
        feed_key: &str,
        batch: Vec<Row>,
        total_rows_in_feed: u64,
        last_row_index: u64,
    ) -> Result<(), IngestError> {
        let job = BatchJob::new(feed_key.to_string(), batch, total_rows_in_feed, last_row_index);
        let newly_enqueued = self.queue.enqueue(job, JobOptions::default()).await?;
        if !newly_enqueued {
            warn!(feed_key, last_row_index, "batch job id was a duplicate, skipped");
        }
        Ok(())
    }
}

fn count_data_rows(text: &str, feed_key: &str) -> Result<u64, IngestError> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(text.as_bytes());
    if reader.headers()?.is_empty() {
        return Err(IngestError::MissingHeader {
            feed_key: feed_key.to_string(),
        });
    }
    let mut count = 0u64;
    for record in reader.records() {
        record?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use catalog_core::checkpoint::{FeedSnapshot, JsonCheckpointStore};
    use catalog_core::queue::SledJobQueue;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct FakeObjectStore {
        bodies: Mutex<HashMap<String, bytes::Bytes>>,
    }

    #[async_trait]
    impl ObjectStore for FakeObjectStore {
        async fn list(&self, _bucket: &str, _prefix: &str) -> Result<Vec<String>, IngestError> {
            Ok(self.bodies.lock().unwrap().keys().cloned().collect())
        }

        async fn get(&self, _bucket: &str, key: &str) -> Result<bytes::Bytes, IngestError> {
            self.bodies
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .ok_or_else(|| IngestError::MissingHeader {
                    feed_key: key.to_string(),
                })
        }
    }

    fn store_with(csv_body: &str) -> FakeObjectStore {
        let mut bodies = HashMap::new();
        bodies.insert("feed.csv".to_string(), bytes::Bytes::from(csv_body.to_string()));
        FakeObjectStore {
            bodies: Mutex::new(bodies),
        }
    }

    #[tokio::test]
    async fn ingests_rows_into_fixed_size_batches_with_a_tail() {
        let csv_body = "Part Number,SKU\nA-1,s1\nA-2,s2\nA-3,s3\n";
        let object_store = Arc::new(store_with(csv_body));

        let dir = tempdir().unwrap();
        let checkpoint = Arc::new(
            JsonCheckpointStore::open(dir.path().join("process_checkpoint.json"))
                .await
                .unwrap(),
        );
        let queue = Arc::new(SledJobQueue::open(dir.path().join("queue")).unwrap());

        let ingestor = FeedIngestor::new(object_store, checkpoint.clone(), queue.clone());
        ingestor.ingest("bucket", "feed.csv", "feed-a", 2).await.unwrap();

        let snapshots: Vec<FeedSnapshot> = checkpoint.read_all().await;
        let snap = snapshots.iter().find(|s| s.feed_key == "feed-a").unwrap();
        assert_eq!(snap.checkpoint.total_rows_in_feed, 3);

        let first = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(first.job.batch.len(), 2);
        let second = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(second.job.batch.len(), 1);
    }

    #[tokio::test]
    async fn missing_part_number_rows_pass_through_rather_than_filtered() {
        let csv_body = "Part Number,SKU\n,s1\nA-2,s2\n";
        let object_store = Arc::new(store_with(csv_body));

        let dir = tempdir().unwrap();
        let checkpoint = Arc::new(
            JsonCheckpointStore::open(dir.path().join("process_checkpoint.json"))
                .await
                .unwrap(),
        );
        let queue = Arc::new(SledJobQueue::open(dir.path().join("queue")).unwrap());

        let ingestor = FeedIngestor::new(object_store, checkpoint, queue.clone());
        ingestor.ingest("bucket", "feed.csv", "feed-a", 10).await.unwrap();

        let job = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(job.job.batch.len(), 2);
        assert!(job.job.batch[0].missing_part_number());
    }
}
