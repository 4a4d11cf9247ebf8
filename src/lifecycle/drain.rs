//! Counting barrier between in-flight shutdowns and final resource release.

use std::sync::Arc;

use tokio::sync::watch;

use crate::observability::metrics;

/// Counts `Supervisor::stop` calls in progress.
///
/// Any number of permits may be held at once; `wait_idle` returns once the
/// count is back to zero.
#[derive(Debug, Clone)]
pub struct DrainGate {
    count: Arc<watch::Sender<usize>>,
}

impl DrainGate {
    pub fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self {
            count: Arc::new(count),
        }
    }

    /// Open a drain. The count drops again when the permit is dropped, on
    /// every exit path.
    pub fn enter(&self) -> DrainPermit {
        let mut now = 0;
        self.count.send_modify(|n| {
            *n += 1;
            now = *n;
        });
        metrics::set_drains_in_flight(now);
        DrainPermit {
            count: Arc::clone(&self.count),
        }
    }

    pub fn in_flight(&self) -> usize {
        *self.count.borrow()
    }

    /// Wait until no drain is in flight.
    pub async fn wait_idle(&self) {
        let mut rx = self.count.subscribe();
        // The sender lives in `self`, so this cannot fail.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

impl Default for DrainGate {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
#[must_use = "the drain closes as soon as the permit is dropped"]
pub struct DrainPermit {
    count: Arc<watch::Sender<usize>>,
}

impl Drop for DrainPermit {
    fn drop(&mut self) {
        let mut now = 0;
        self.count.send_modify(|n| {
            *n = n.saturating_sub(1);
            now = *n;
        });
        metrics::set_drains_in_flight(now);
    }
}
