use std::time::Duration;

/// Shutdown durations, fixed when the supervisor is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownPlan {
    grace: Duration,
    healthcheck_wait: Option<Duration>,
}

impl ShutdownPlan {
    pub const fn new(grace: Duration, healthcheck_wait: Option<Duration>) -> Self {
        Self {
            grace,
            healthcheck_wait,
        }
    }

    /// Grace period the signal watcher passes to `Supervisor::stop`.
    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Pause between failing health checks and stopping the transports.
    pub fn healthcheck_wait(&self) -> Option<Duration> {
        self.healthcheck_wait
    }
}
