//! OS signal handling.
//!
//! # Responsibilities
//! - Listen for SIGTERM and SIGINT (Ctrl-C off Unix)
//! - On the first one, run `Supervisor::stop` with the configured grace
//!
//! # Design Decisions
//! - Single-shot: the watcher exits after the first signal. The handlers
//!   stay registered for the life of the process, so later signals are
//!   ignored rather than terminating it
//! - The signal source is injectable so the bridge can be tested without
//!   sending real signals to the test process

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::lifecycle::supervisor::Supervisor;

pub struct SignalWatcher;

impl SignalWatcher {
    /// Watch the process termination signals.
    pub fn spawn(supervisor: Supervisor, grace: Duration) -> JoinHandle<()> {
        Self::spawn_with(supervisor, grace, termination())
    }

    /// Stop `supervisor` when `signal` resolves to `Some(name)`. `None` means
    /// no signal source is available and the watcher exits quietly.
    pub fn spawn_with<S>(supervisor: Supervisor, grace: Duration, signal: S) -> JoinHandle<()>
    where
        S: Future<Output = Option<&'static str>> + Send + 'static,
    {
        tokio::spawn(async move {
            let Some(name) = signal.await else {
                return;
            };
            tracing::info!(signal = name, grace = ?grace, "Received signal, shutting down");
            supervisor.stop_with_trigger(grace, "signal").await;
        })
    }
}

#[cfg(unix)]
async fn termination() -> Option<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut term, mut int) = match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(term), Ok(int)) => (term, int),
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Failed to install signal handlers");
            return None;
        }
    };

    tokio::select! {
        _ = term.recv() => Some("SIGTERM"),
        _ = int.recv() => Some("SIGINT"),
    }
}

#[cfg(not(unix))]
async fn termination() -> Option<&'static str> {
    match tokio::signal::ctrl_c().await {
        Ok(()) => Some("ctrl-c"),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install Ctrl-C handler");
            None
        }
    }
}
