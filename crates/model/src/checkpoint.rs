use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable per-feed progress record. Written after every successful batch
/// commit; `last_processed_row` is monotonically non-decreasing for a
/// given `feed_key`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub feed_key: String,
    pub last_processed_row: u64,
    pub total_rows_in_feed: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterKind {
    Updated,
    Skipped,
    Failed,
    Total,
}

/// Per-feed outcome counters. `updated + skipped + failed <= total` holds
/// at every observation; equality holds iff the feed is complete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub updated: u64,
    pub skipped: u64,
    pub failed: u64,
    pub total: u64,
}

impl Counters {
    pub fn processed(&self) -> u64 {
        self.updated + self.skipped + self.failed
    }

    /// A zero-row feed (header-only CSV) is complete immediately -- there
    /// is nothing to process and nothing to wait for.
    pub fn is_complete(&self) -> bool {
        self.processed() >= self.total
    }

    pub fn increment(&mut self, which: CounterKind, by: u64) {
        match which {
            CounterKind::Updated => self.updated += by,
            CounterKind::Skipped => self.skipped += by,
            CounterKind::Failed => self.failed += by,
            CounterKind::Total => self.total += by,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processed_never_exceeds_total_once_capped_by_caller() {
        let mut c = Counters::default();
        c.increment(CounterKind::Total, 10);
        c.increment(CounterKind::Updated, 4);
        c.increment(CounterKind::Skipped, 3);
        c.increment(CounterKind::Failed, 3);
        assert_eq!(c.processed(), 10);
        assert!(c.is_complete());
    }

    #[test]
    fn incomplete_while_processed_below_total() {
        let mut c = Counters::default();
        c.increment(CounterKind::Total, 10);
        c.increment(CounterKind::Updated, 5);
        assert!(!c.is_complete());
    }

    #[test]
    fn zero_row_feed_is_complete_immediately() {
        let c = Counters::default();
        assert_eq!(c.total, 0);
        assert!(c.is_complete());
    }
}
