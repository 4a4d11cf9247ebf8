//! First-result-wins join of the two transport outcomes.

use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::net::{ListenerError, TransportKind};
use crate::observability::metrics;

/// How one transport's serve loop ended.
#[derive(Debug)]
pub struct TransportExit {
    pub transport: TransportKind,
    pub result: Result<(), ListenerError>,
}

/// Two-slot queue fed by both serve tasks.
///
/// Only the first outcome is ever read. The capacity equals the number of
/// serve tasks and each sends once, so a send never waits, even after the
/// reader is gone.
#[derive(Debug)]
pub struct ErrorFanIn {
    tx: mpsc::Sender<TransportExit>,
    rx: mpsc::Receiver<TransportExit>,
}

impl ErrorFanIn {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(2);
        Self { tx, rx }
    }

    /// Run `serve` on its own task and report its outcome here when it returns.
    pub fn spawn<F>(&self, transport: TransportKind, serve: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<(), ListenerError>> + Send + 'static,
    {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = serve.await;
            metrics::record_transport_exit(transport, result.is_ok());
            match &result {
                Ok(()) => tracing::info!(transport = %transport, "Transport exited"),
                Err(e) => tracing::error!(transport = %transport, error = %e, "Transport failed"),
            }
            // The reader may already have taken the other outcome and gone.
            let _ = tx.send(TransportExit { transport, result }).await;
        })
    }

    /// Wait for the first transport to exit.
    ///
    /// Returns `None` only if every reporting task died without reporting.
    pub async fn first(self) -> Option<TransportExit> {
        let Self { tx, mut rx } = self;
        drop(tx);
        rx.recv().await
    }
}

impl Default for ErrorFanIn {
    fn default() -> Self {
        Self::new()
    }
}
