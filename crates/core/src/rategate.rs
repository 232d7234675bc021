use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::RateGateError;
use crate::retry::RetryPolicy;

/// Transient-error classifier the caller supplies so `RateGate` can decide
/// whether `on_failure` recommends a retry.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Bounded-concurrency, minimum-spacing admitter for outbound remote calls.
/// Ordering across ids is best-effort FIFO; fairness across ids is not
/// guaranteed.
#[derive(Clone)]
pub struct RateGate {
    semaphore: Arc<Semaphore>,
    min_spacing: Duration,
    last_dispatch: Arc<Mutex<Option<Instant>>>,
    retry: RetryPolicy,
}

impl RateGate {
    pub fn new(max_concurrent: usize, min_spacing: Duration, retry: RetryPolicy) -> Self {
        RateGate {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            min_spacing,
            last_dispatch: Arc::new(Mutex::new(None)),
            retry,
        }
    }

    /// Admits `task` once a concurrency slot and spacing interval are both
    /// available, then runs it. Dropping the surrounding future while this
    /// is suspended cancels admission cleanly; an explicit
    /// [`CancellationToken`] lets callers cancel cooperatively instead.
    pub async fn schedule<F, Fut, T>(
        &self,
        id: &str,
        context: Option<&str>,
        cancel: &CancellationToken,
        task: F,
    ) -> Result<T, RateGateError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RateGateError::Cancelled),
            permit = self.semaphore.acquire() => permit,
        };
        let _permit = permit.map_err(|_| RateGateError::Cancelled)?;

        self.wait_for_spacing(cancel).await?;

        trace!(job_id = id, context = context.unwrap_or(""), "rate gate admitting task");
        Ok(task().await)
    }

    async fn wait_for_spacing(&self, cancel: &CancellationToken) -> Result<(), RateGateError> {
        let mut last = self.last_dispatch.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_spacing {
                let remaining = self.min_spacing - elapsed;
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(RateGateError::Cancelled),
                    _ = tokio::time::sleep(remaining) => {}
                }
            }
        }
        *last = Some(Instant::now());
        Ok(())
    }

    /// Retry policy hook for callers: the gate itself never retries, it
    /// only centralizes the decision so every collaborator backs off the
    /// same way.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn bounds_concurrency_to_configured_max() {
        let gate = RateGate::new(2, Duration::from_millis(0), RetryPolicy::default());
        let cancel = CancellationToken::new();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for i in 0..6 {
            let gate = gate.clone();
            let cancel = cancel.clone();
            let in_flight = in_flight.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                gate.schedule(&format!("job-{i}"), None, &cancel, || async {
                    let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(current, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                })
                .await
                .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn cancellation_while_waiting_for_admission_is_reported() {
        let gate = RateGate::new(1, Duration::from_millis(0), RetryPolicy::default());
        let cancel = CancellationToken::new();

        let blocker_cancel = CancellationToken::new();
        let gate_clone = gate.clone();
        let _blocker = tokio::spawn(async move {
            gate_clone
                .schedule("blocker", None, &blocker_cancel, || async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                })
                .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
        let result = gate
            .schedule("waiter", None, &cancel, || async { 1u32 })
            .await;
        assert!(matches!(result, Err(RateGateError::Cancelled)));
    }

    #[tokio::test]
    async fn enforces_minimum_spacing_between_dispatches() {
        let gate = RateGate::new(4, Duration::from_millis(50), RetryPolicy::default());
        let cancel = CancellationToken::new();

        let started_at = Instant::now();
        gate.schedule("a", None, &cancel, || async {}).await.unwrap();
        gate.schedule("b", None, &cancel, || async {}).await.unwrap();
        assert!(started_at.elapsed() >= Duration::from_millis(50));
    }
}
