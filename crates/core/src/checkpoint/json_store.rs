use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use model::{Checkpoint, CounterKind, Counters};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use super::{CheckpointStore, FeedSnapshot};
use crate::error::CheckpointError;

#[derive(Debug, Default)]
struct FeedState {
    last_processed_row: AtomicU64,
    total_rows_in_feed: AtomicU64,
    updated: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

impl FeedState {
    fn from_snapshot(checkpoint: &Checkpoint, counters: &Counters) -> Self {
        FeedState {
            last_processed_row: AtomicU64::new(checkpoint.last_processed_row),
            total_rows_in_feed: AtomicU64::new(checkpoint.total_rows_in_feed),
            updated: AtomicU64::new(counters.updated),
            skipped: AtomicU64::new(counters.skipped),
            failed: AtomicU64::new(counters.failed),
        }
    }

    fn to_checkpoint(&self, feed_key: &str) -> Checkpoint {
        Checkpoint {
            feed_key: feed_key.to_string(),
            last_processed_row: self.last_processed_row.load(Ordering::SeqCst),
            total_rows_in_feed: self.total_rows_in_feed.load(Ordering::SeqCst),
            timestamp: Utc::now(),
        }
    }

    fn to_counters(&self) -> Counters {
        Counters {
            updated: self.updated.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            total: self.total_rows_in_feed.load(Ordering::SeqCst),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedFeed {
    checkpoint: Checkpoint,
    counters: Counters,
}

/// JSON-file-backed [`CheckpointStore`]. All feeds share a single file,
/// rewritten atomically (write-tmp-then-rename) on every `commit_batch`.
/// In-memory counters are plain atomics keyed by feed so `increment_counter`
/// never blocks on file IO.
pub struct JsonCheckpointStore {
    path: PathBuf,
    state: RwLock<HashMap<String, Arc<FeedState>>>,
    write_lock: Mutex<()>,
}

impl JsonCheckpointStore {
    /// Opens (or creates) the checkpoint file at `path`, rebuilding the
    /// in-memory atomics from whatever was last persisted.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, CheckpointError> {
        let path = path.as_ref().to_path_buf();
        let mut state = HashMap::new();

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let persisted: HashMap<String, PersistedFeed> =
                    serde_json::from_slice(&bytes).map_err(CheckpointError::Serialize)?;
                for (feed_key, entry) in persisted {
                    state.insert(
                        feed_key,
                        Arc::new(FeedState::from_snapshot(&entry.checkpoint, &entry.counters)),
                    );
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(CheckpointError::Read {
                    path: path.display().to_string(),
                    source,
                });
            }
        }

        Ok(JsonCheckpointStore {
            path,
            state: RwLock::new(state),
            write_lock: Mutex::new(()),
        })
    }

    async fn feed_state(&self, feed_key: &str) -> Arc<FeedState> {
        if let Some(existing) = self.state.read().await.get(feed_key) {
            return existing.clone();
        }
        let mut guard = self.state.write().await;
        guard
            .entry(feed_key.to_string())
            .or_insert_with(|| Arc::new(FeedState::default()))
            .clone()
    }

    async fn persist(&self) -> Result<(), CheckpointError> {
        let _guard = self.write_lock.lock().await;

        let snapshot: HashMap<String, PersistedFeed> = {
            let state = self.state.read().await;
            state
                .iter()
                .map(|(feed_key, fs)| {
                    (
                        feed_key.clone(),
                        PersistedFeed {
                            checkpoint: fs.to_checkpoint(feed_key),
                            counters: fs.to_counters(),
                        },
                    )
                })
                .collect()
        };

        let bytes = serde_json::to_vec_pretty(&snapshot).map_err(CheckpointError::Serialize)?;

        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &bytes)
            .await
            .map_err(|source| CheckpointError::Write {
                path: tmp_path.display().to_string(),
                source,
            })?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|source| CheckpointError::Write {
                path: self.path.display().to_string(),
                source,
            })?;

        debug!(path = %self.path.display(), "checkpoint file rewritten");
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for JsonCheckpointStore {
    async fn set_total(&self, feed_key: &str, total: u64) -> Result<(), CheckpointError> {
        let fs = self.feed_state(feed_key).await;
        fs.total_rows_in_feed.store(total, Ordering::SeqCst);
        self.persist().await
    }

    async fn get_last_processed(&self, feed_key: &str) -> u64 {
        self.feed_state(feed_key)
            .await
            .last_processed_row
            .load(Ordering::SeqCst)
    }

    async fn commit_batch(
        &self,
        feed_key: &str,
        new_last: u64,
        total: u64,
    ) -> Result<(), CheckpointError> {
        let fs = self.feed_state(feed_key).await;
        let capped = new_last.min(total);
        fs.last_processed_row
            .fetch_max(capped, Ordering::SeqCst);
        fs.total_rows_in_feed.store(total, Ordering::SeqCst);
        self.persist().await
    }

    async fn increment_counter(&self, feed_key: &str, which: CounterKind, by: u64) {
        let fs = self.feed_state(feed_key).await;
        let target = match which {
            CounterKind::Updated => &fs.updated,
            CounterKind::Skipped => &fs.skipped,
            CounterKind::Failed => &fs.failed,
            CounterKind::Total => &fs.total_rows_in_feed,
        };
        target.fetch_add(by, Ordering::SeqCst);
    }

    async fn read_all(&self) -> Vec<FeedSnapshot> {
        let state = self.state.read().await;
        state
            .iter()
            .map(|(feed_key, fs)| FeedSnapshot {
                feed_key: feed_key.clone(),
                checkpoint: fs.to_checkpoint(feed_key),
                counters: fs.to_counters(),
            })
            .collect()
    }
}
