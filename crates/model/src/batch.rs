use crate::row::Row;
use serde::{Deserialize, Serialize};

/// A contiguous, disjoint range of rows within a single feed, carried
/// through the durable queue as the unit of work for one worker call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    pub feed_key: String,
    pub batch: Vec<Row>,
    pub total_rows_in_feed: u64,
    /// Index (1-based count of rows seen so far) of the final row in this
    /// batch. Used, together with `feed_key`, to derive a deterministic
    /// job id -- never a row-level remote id, which would make the id
    /// non-deterministic across runs.
    pub last_row_index: u64,
}

impl BatchJob {
    pub fn new(feed_key: String, batch: Vec<Row>, total_rows_in_feed: u64, last_row_index: u64) -> Self {
        BatchJob {
            feed_key,
            batch,
            total_rows_in_feed,
            last_row_index,
        }
    }

    /// Deterministic from `(feed_key, last_row_index)` alone so that
    /// re-enqueuing the same row range is a no-op at the queue layer.
    pub fn job_id(&self) -> String {
        job_id(&self.feed_key, self.last_row_index)
    }
}

pub fn job_id(feed_key: &str, last_row_index: u64) -> String {
    format!("{feed_key}_{last_row_index}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn row() -> Row {
        let headers: Arc<[String]> = Arc::from(vec!["part_number".to_string()]);
        Row::new(headers, vec!["X-1".to_string()])
    }

    #[test]
    fn job_id_is_deterministic_and_ignores_row_content() {
        let a = BatchJob::new("feed-1".into(), vec![row()], 100, 50);
        let b = BatchJob::new("feed-1".into(), vec![row(), row()], 100, 50);
        assert_eq!(a.job_id(), b.job_id());
        assert_eq!(a.job_id(), "feed-1_50");
    }

    #[test]
    fn job_id_varies_with_feed_or_index() {
        let a = job_id("feed-1", 50);
        let b = job_id("feed-2", 50);
        let c = job_id("feed-1", 51);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
