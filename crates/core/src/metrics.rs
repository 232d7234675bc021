use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct InnerMetrics {
    rows_ingested: AtomicU64,
    batches_enqueued: AtomicU64,
    batches_completed: AtomicU64,
    remote_calls: AtomicU64,
    retry_count: AtomicU64,
    failure_count: AtomicU64,
}

/// Process-wide counters, independent of the per-feed [`model::Counters`]
/// persisted in a checkpoint. Cheap to clone; every clone shares the same
/// atomics.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<InnerMetrics>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub rows_ingested: u64,
    pub batches_enqueued: u64,
    pub batches_completed: u64,
    pub remote_calls: u64,
    pub retry_count: u64,
    pub failure_count: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            inner: Arc::new(InnerMetrics::default()),
        }
    }

    pub fn increment_rows_ingested(&self, count: u64) {
        self.inner.rows_ingested.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_batches_enqueued(&self, count: u64) {
        self.inner
            .batches_enqueued
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_batches_completed(&self, count: u64) {
        self.inner
            .batches_completed
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_remote_calls(&self, count: u64) {
        self.inner.remote_calls.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_retries(&self, count: u64) {
        self.inner.retry_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_failures(&self, count: u64) {
        self.inner.failure_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rows_ingested: self.inner.rows_ingested.load(Ordering::Relaxed),
            batches_enqueued: self.inner.batches_enqueued.load(Ordering::Relaxed),
            batches_completed: self.inner.batches_completed.load(Ordering::Relaxed),
            remote_calls: self.inner.remote_calls.load(Ordering::Relaxed),
            retry_count: self.inner.retry_count.load(Ordering::Relaxed),
            failure_count: self.inner.failure_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
