//! Deadline-bounded wait on a stop operation that may never finish.

use std::future::Future;
use std::time::Duration;

use crate::observability::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Completed,
    TimedOut,
}

/// Run `stop` on its own task and wait for it at most `deadline`.
///
/// On timeout the task is left running and its result is discarded; the
/// caller must follow up with a forced stop.
pub async fn bounded_graceful_stop<F>(deadline: Duration, stop: F) -> StopOutcome
where
    F: Future<Output = ()> + Send + 'static,
{
    let task = tokio::spawn(stop);
    match tokio::time::timeout(deadline, task).await {
        Ok(Ok(())) => StopOutcome::Completed,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Graceful stop task failed");
            StopOutcome::Completed
        }
        Err(_) => {
            metrics::record_graceful_stop_timeout();
            StopOutcome::TimedOut
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn hung_stop_unblocks_at_deadline() {
        for deadline in [Duration::ZERO, Duration::from_millis(1), Duration::from_millis(100)] {
            let start = Instant::now();
            let outcome = bounded_graceful_stop(deadline, std::future::pending()).await;
            let elapsed = start.elapsed();

            assert_eq!(outcome, StopOutcome::TimedOut);
            assert!(elapsed >= deadline, "{:?} < {:?}", elapsed, deadline);
            assert!(
                elapsed <= deadline + Duration::from_millis(1),
                "{:?} overshot {:?}",
                elapsed,
                deadline
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fast_stop_completes() {
        let outcome = bounded_graceful_stop(Duration::from_secs(1), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
        })
        .await;
        assert_eq!(outcome, StopOutcome::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_stop_keeps_running() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        let outcome = bounded_graceful_stop(Duration::from_millis(10), async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            flag.store(true, Ordering::SeqCst);
        })
        .await;

        assert_eq!(outcome, StopOutcome::TimedOut);
        assert!(!finished.load(Ordering::SeqCst));
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(finished.load(Ordering::SeqCst));
    }
}
