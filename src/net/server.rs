//! Connection serving shared by the RPC and gateway transports.
//!
//! # Responsibilities
//! - Run the accept loop for one transport
//! - Serve each connection (HTTP/1.1 or HTTP/2) with an axum router
//! - Graceful stop: stop accepting, let every connection finish in-flight work
//! - Forced stop: drop every connection immediately
//! - Optional per-connection maximum age and maximum idle time
//!
//! # Design Decisions
//! - Stop requests are level-triggered watch flags, so stopping is idempotent
//!   and a stop issued before the accept loop starts is still honored
//! - The accept loop returns as soon as draining begins; waiting for
//!   connections is the job of `ServerHandle::shutdown`
//! - Connections are owned by their own tasks so the accept loop never blocks

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use hyper::body::Incoming;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tower::Service;

use crate::net::backoff::{accept_backoff, jittered};
use crate::net::connection::{ConnectionGuard, ConnectionTracker};
use crate::net::listener::{ConnectionPermit, Listener, ListenerError};
use crate::net::TransportKind;

const ACCEPT_BACKOFF_BASE: Duration = Duration::from_millis(5);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Per-connection limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Ask a connection to drain once it is this old (±10%).
    pub max_age: Option<Duration>,
    /// Close a draining aged connection after this long.
    pub max_age_grace: Option<Duration>,
    /// Ask a connection to drain once no request has been in flight for this long.
    ///
    /// A request counts as in flight until its response head is sent, so a
    /// long response stream does not keep the connection busy. Draining never
    /// cuts such a stream short.
    pub max_idle: Option<Duration>,
}

/// Control handle for one transport.
///
/// Cheap to clone. Every method may be called any number of times, from any
/// task, before or after [`serve`] has started.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    inner: Arc<Control>,
}

#[derive(Debug)]
struct Control {
    transport: TransportKind,
    draining: watch::Sender<bool>,
    terminated: watch::Sender<bool>,
    bound: watch::Sender<Option<SocketAddr>>,
    connections: ConnectionTracker,
}

impl ServerHandle {
    pub fn new(transport: TransportKind) -> Self {
        let (draining, _) = watch::channel(false);
        let (terminated, _) = watch::channel(false);
        let (bound, _) = watch::channel(None);
        Self {
            inner: Arc::new(Control {
                transport,
                draining,
                terminated,
                bound,
                connections: ConnectionTracker::new(transport),
            }),
        }
    }

    pub fn transport(&self) -> TransportKind {
        self.inner.transport
    }

    /// Stop accepting and ask open connections to finish. Does not wait.
    pub fn begin_shutdown(&self) {
        let was_draining = self.inner.draining.send_replace(true);
        if !was_draining {
            tracing::debug!(transport = %self.inner.transport, "Transport draining");
        }
    }

    /// Graceful stop: stop accepting and wait until every connection has closed.
    ///
    /// May wait forever if a peer never finishes; callers bound it.
    pub async fn shutdown(&self) {
        self.begin_shutdown();
        self.inner.connections.wait_idle().await;
    }

    /// Forced stop: stop accepting and drop every open connection.
    pub async fn force_stop(&self) {
        self.begin_shutdown();
        let was_terminated = self.inner.terminated.send_replace(true);
        if !was_terminated {
            tracing::debug!(
                transport = %self.inner.transport,
                open_connections = self.inner.connections.active_count(),
                "Transport force-closing connections"
            );
        }
        self.inner.connections.wait_idle().await;
    }

    pub fn is_draining(&self) -> bool {
        *self.inner.draining.borrow()
    }

    pub fn active_connections(&self) -> usize {
        self.inner.connections.active_count()
    }

    /// Address the transport is listening on, once bound.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.inner.bound.borrow()
    }

    /// Wait until the transport is listening. Returns `None` if it starts
    /// draining first.
    pub async fn wait_listening(&self) -> Option<SocketAddr> {
        let mut bound = self.inner.bound.subscribe();
        let mut draining = self.inner.draining.subscribe();
        tokio::select! {
            addr = bound_addr(&mut bound) => addr,
            _ = signalled(&mut draining) => self.local_addr(),
        }
    }
}

async fn signalled(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|set| *set).await;
}

async fn bound_addr(rx: &mut watch::Receiver<Option<SocketAddr>>) -> Option<SocketAddr> {
    match rx.wait_for(Option::is_some).await {
        Ok(addr) => *addr,
        Err(_) => None,
    }
}

/// Bind `address` and serve `router` until `handle` starts draining.
///
/// Returns `Ok(())` on a deliberate stop, or the bind / fatal accept error.
pub async fn serve(
    handle: ServerHandle,
    address: String,
    max_connections: usize,
    router: Router,
    options: ConnectionOptions,
) -> Result<(), ListenerError> {
    let transport = handle.transport();
    let mut draining = handle.inner.draining.subscribe();
    if *draining.borrow() {
        tracing::debug!(transport = %transport, "Transport stopped before listening");
        return Ok(());
    }

    let listener = Listener::bind(&address, max_connections).await?;
    let local_addr = listener.local_addr().map_err(|source| ListenerError::Bind {
        address: address.clone(),
        source,
    })?;
    handle.inner.bound.send_replace(Some(local_addr));

    tracing::info!(
        transport = %transport,
        address = %local_addr,
        max_connections,
        "Transport listening"
    );

    let mut failures = 0u32;
    loop {
        let accepted = tokio::select! {
            biased;
            _ = signalled(&mut draining) => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer, permit)) => {
                failures = 0;
                let guard = handle.inner.connections.track();
                let connection = Connection {
                    transport,
                    peer,
                    router: router.clone(),
                    draining: handle.inner.draining.subscribe(),
                    terminated: handle.inner.terminated.subscribe(),
                    options,
                    guard,
                    _permit: permit,
                };
                tokio::spawn(connection.run(stream));
            }
            Err(e) if e.is_transient() => {
                failures = failures.saturating_add(1);
                let delay = accept_backoff(failures, ACCEPT_BACKOFF_BASE, ACCEPT_BACKOFF_MAX);
                tracing::warn!(
                    transport = %transport,
                    error = %e,
                    retry_in = ?delay,
                    "Accept failed, backing off"
                );
                tokio::select! {
                    biased;
                    _ = signalled(&mut draining) => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            Err(e) => {
                tracing::error!(transport = %transport, error = %e, "Accept loop failed");
                return Err(e);
            }
        }
    }

    tracing::info!(transport = %transport, address = %local_addr, "Transport stopped accepting");
    Ok(())
}

/// One accepted connection and everything it needs to run on its own task.
struct Connection {
    transport: TransportKind,
    peer: SocketAddr,
    router: Router,
    draining: watch::Receiver<bool>,
    terminated: watch::Receiver<bool>,
    options: ConnectionOptions,
    guard: ConnectionGuard,
    _permit: ConnectionPermit,
}

impl Connection {
    async fn run(mut self, stream: TcpStream) {
        let _ = stream.set_nodelay(true);

        let router = self.router.clone();
        let (requests, mut in_flight) = watch::channel(0usize);
        let requests = Arc::new(requests);
        let service = hyper::service::service_fn(move |request: Request<Incoming>| {
            let mut router = router.clone();
            let active = InFlight::enter(&requests);
            async move {
                let _active = active;
                router.call(request).await
            }
        });

        let builder = auto::Builder::new(TokioExecutor::new());
        let conn = builder.serve_connection(TokioIo::new(stream), service);
        tokio::pin!(conn);

        let age_deadline = self.options.max_age.map(|age| Instant::now() + jittered(age));
        let mut close_deadline: Option<Instant> = None;
        let mut draining = false;

        loop {
            tokio::select! {
                result = conn.as_mut() => {
                    if let Err(e) = result {
                        tracing::debug!(
                            connection_id = %self.guard.id(),
                            peer = %self.peer,
                            error = %e,
                            "Connection ended with error"
                        );
                    }
                    break;
                }
                _ = signalled(&mut self.terminated) => {
                    tracing::debug!(
                        connection_id = %self.guard.id(),
                        transport = %self.transport,
                        "Connection force-closed"
                    );
                    break;
                }
                _ = signalled(&mut self.draining), if !draining => {
                    conn.as_mut().graceful_shutdown();
                    draining = true;
                }
                _ = sleep_until(age_deadline.unwrap_or_else(Instant::now)),
                    if !draining && age_deadline.is_some() =>
                {
                    tracing::debug!(connection_id = %self.guard.id(), "Connection reached max age");
                    conn.as_mut().graceful_shutdown();
                    draining = true;
                    close_deadline = self.options.max_age_grace.map(|grace| Instant::now() + grace);
                }
                _ = idle_for(&mut in_flight, self.options.max_idle.unwrap_or_default()),
                    if !draining && self.options.max_idle.is_some() =>
                {
                    tracing::debug!(connection_id = %self.guard.id(), "Connection idle");
                    conn.as_mut().graceful_shutdown();
                    draining = true;
                }
                _ = sleep_until(close_deadline.unwrap_or_else(Instant::now)),
                    if close_deadline.is_some() =>
                {
                    tracing::debug!(connection_id = %self.guard.id(), "Connection age grace expired");
                    break;
                }
            }
        }
    }
}

/// One request on a connection, from arrival until its response head is ready.
struct InFlight(Arc<watch::Sender<usize>>);

impl InFlight {
    fn enter(requests: &Arc<watch::Sender<usize>>) -> Self {
        requests.send_modify(|n| *n += 1);
        Self(Arc::clone(requests))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.send_modify(|n| *n = n.saturating_sub(1));
    }
}

/// Resolves once no request has been in flight for `idle`.
async fn idle_for(in_flight: &mut watch::Receiver<usize>, idle: Duration) {
    loop {
        if in_flight.wait_for(|n| *n == 0).await.is_err() {
            return std::future::pending().await;
        }
        tokio::select! {
            _ = tokio::time::sleep(idle) => return,
            changed = in_flight.changed() => {
                if changed.is_err() {
                    return std::future::pending().await;
                }
            }
        }
    }
}
