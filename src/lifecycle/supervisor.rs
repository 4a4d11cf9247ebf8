//! The lifecycle supervisor.
//!
//! # Responsibilities
//! - Bind every registered service to both transports, then start both
//! - Return when the first transport exits, after any shutdown in progress
//!   has finished and the closers have run
//! - Bounded, repeatable shutdown (`stop`), safe to race with itself and
//!   with the signal watcher
//!
//! # Data Flow
//! ```text
//! run():
//!     close registry → bind_rpc × N → bind_gateway × N
//!     → spawn RPC serve ─┐
//!     → spawn gateway   ─┴→ ErrorFanIn::first()
//!     → tear down transports (if no stop is in flight)
//!     → DrainGate::wait_idle() → join serve tasks → closers → return
//!
//! stop(grace):
//!     DrainGate::enter()
//!     → fail_check(true) on every health reporter
//!     → optional health-check propagation wait
//!     → gateway: begin close (async, bounded, then forced)
//!     → RPC: bounded graceful stop, then forced stop
//!     → Drainable::stop in registration order
//!     → permit dropped
//! ```

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::watch;

use crate::config::{RpcConfig, ServerConfig};
use crate::gateway::{gateway_router, GatewayMux, HeaderMatcher};
use crate::lifecycle::bounded::{bounded_graceful_stop, StopOutcome};
use crate::lifecycle::closer::Closer;
use crate::lifecycle::drain::DrainGate;
use crate::lifecycle::error::SupervisorError;
use crate::lifecycle::fanin::{ErrorFanIn, TransportExit};
use crate::lifecycle::plan::ShutdownPlan;
use crate::lifecycle::signals::SignalWatcher;
use crate::net::{self, ConnectionOptions, ServerHandle, TransportKind};
use crate::observability::metrics;
use crate::rpc::{RpcEndpoint, RpcRegistrar};
use crate::service::{RegistrationError, Service, ServiceRegistry};

/// Addresses both transports are listening on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundAddrs {
    pub rpc: SocketAddr,
    pub gateway: SocketAddr,
}

/// Runs the RPC and gateway transports and owns their shutdown.
///
/// Cheap to clone; clones share state. `run` may be called once.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

struct Inner {
    config: ServerConfig,
    plan: ShutdownPlan,
    registration: Mutex<Registration>,
    transports: watch::Sender<Option<TransportPair>>,
    closers: Mutex<Vec<Closer>>,
    openapi: Mutex<Option<Router>>,
    prometheus: Option<PrometheusHandle>,
    drain_gate: DrainGate,
}

#[derive(Default)]
struct Registration {
    services: ServiceRegistry,
    closed: bool,
}

/// Control handles for the two transports. Created once, by `run`.
#[derive(Debug, Clone)]
struct TransportPair {
    rpc: ServerHandle,
    gateway: ServerHandle,
}

impl Supervisor {
    pub fn new(config: ServerConfig) -> Self {
        Self::build(config, None)
    }

    /// Like [`Supervisor::new`], exposing `handle` on the gateway's `/metrics`.
    pub fn with_metrics(config: ServerConfig, handle: PrometheusHandle) -> Self {
        Self::build(config, Some(handle))
    }

    fn build(config: ServerConfig, prometheus: Option<PrometheusHandle>) -> Self {
        let plan = config.shutdown.plan();
        let (transports, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                config,
                plan,
                registration: Mutex::new(Registration::default()),
                transports,
                closers: Mutex::new(Vec::new()),
                openapi: Mutex::new(None),
                prometheus,
                drain_gate: DrainGate::new(),
            }),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    pub fn plan(&self) -> ShutdownPlan {
        self.inner.plan
    }

    /// Register a service. Services are bound and stopped in registration order.
    pub fn set_service(&self, service: Arc<dyn Service>) -> Result<(), RegistrationError> {
        let mut registration = lock(&self.inner.registration);
        if registration.closed {
            return Err(RegistrationError::RegistryClosed);
        }
        registration.services.register(service);
        Ok(())
    }

    /// Serve `handler` under the configured swagger prefix.
    pub fn set_openapi_handler(&self, handler: Router) {
        *lock(&self.inner.openapi) = Some(handler);
    }

    /// Run `closer` once both transports have exited.
    pub fn add_closer(&self, closer: Closer) {
        lock(&self.inner.closers).push(closer);
    }

    /// Number of `stop` calls currently in progress.
    pub fn drains_in_flight(&self) -> usize {
        self.inner.drain_gate.in_flight()
    }

    /// Wait until both transports are listening. Returns `None` if either
    /// starts draining before it binds.
    pub async fn wait_listening(&self) -> Option<BoundAddrs> {
        let mut transports = self.inner.transports.subscribe();
        let pair = transports
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|pair| pair.clone())?;
        let rpc = pair.rpc.wait_listening().await?;
        let gateway = pair.gateway.wait_listening().await?;
        Some(BoundAddrs { rpc, gateway })
    }

    /// Start both transports and block until the supervisor has stopped.
    ///
    /// Returns the first transport's error, or `Ok(())` after a clean stop.
    pub async fn run(&self) -> Result<(), SupervisorError> {
        let registry = {
            let mut registration = lock(&self.inner.registration);
            if registration.closed {
                return Err(SupervisorError::AlreadyStarted);
            }
            registration.closed = true;
            registration.services.clone()
        };

        let watcher = (!self.inner.config.shutdown.disable_signal_handler)
            .then(|| SignalWatcher::spawn(self.clone(), self.inner.plan.grace()));

        let result = self.serve(&registry).await;

        if let Some(watcher) = watcher {
            watcher.abort();
        }
        self.release_closers();

        match &result {
            Ok(()) => tracing::info!("Supervisor stopped"),
            Err(e) => tracing::error!(error = %e, "Supervisor stopped with error"),
        }
        result
    }

    /// Shut both transports down, giving in-flight RPCs up to `grace`.
    ///
    /// Safe to call any number of times, concurrently, before or after
    /// `run`. Transports that do not exist yet are skipped.
    pub async fn stop(&self, grace: Duration) {
        self.stop_with_trigger(grace, "explicit").await
    }

    pub(crate) async fn stop_with_trigger(&self, grace: Duration, trigger: &'static str) {
        let started = Instant::now();
        let _permit = self.inner.drain_gate.enter();
        metrics::record_shutdown(trigger);

        let registry = lock(&self.inner.registration).services.clone();

        let mut reporters = 0usize;
        for (name, reporter) in registry.health_reporters() {
            tracing::debug!(service = name, "Failing health check");
            reporter.fail_check(true);
            reporters += 1;
        }
        tracing::info!(trigger, services = reporters, "Health checks failing");

        if let Some(wait) = self.inner.plan.healthcheck_wait() {
            tracing::info!(duration = ?wait, "Graceful shutdown timer started");
            tokio::time::sleep(wait).await;
            tracing::info!(duration = ?wait, "Graceful shutdown timer finished");
        }

        tracing::info!(grace = ?grace, "Server shutdown started");
        let transports = self.inner.transports.borrow().clone();
        if let Some(transports) = transports {
            transports.teardown(grace).await;
        }

        for (name, drainable) in registry.drainables() {
            tracing::info!(service = name, "Stopping service");
            drainable.stop();
        }

        metrics::record_drain_duration(started);
    }

    async fn serve(&self, registry: &ServiceRegistry) -> Result<(), SupervisorError> {
        let config = &self.inner.config;
        let (rpc_router, gateway_router) = self.bind(registry)?;

        let pair = TransportPair {
            rpc: ServerHandle::new(TransportKind::Rpc),
            gateway: ServerHandle::new(TransportKind::Gateway),
        };
        self.inner.transports.send_replace(Some(pair.clone()));

        let max_connections = config.listener.max_connections;
        let fan_in = ErrorFanIn::new();
        let rpc_task = fan_in.spawn(
            TransportKind::Rpc,
            net::serve(
                pair.rpc.clone(),
                config.rpc_address(),
                max_connections,
                rpc_router,
                rpc_connection_options(&config.rpc),
            ),
        );
        let gateway_task = fan_in.spawn(
            TransportKind::Gateway,
            net::serve(
                pair.gateway.clone(),
                config.gateway_address(),
                max_connections,
                gateway_router,
                ConnectionOptions::default(),
            ),
        );

        let first = fan_in.first().await;

        // A stop in flight owns the teardown. Otherwise a transport ended on
        // its own and the other one must not outlive it.
        let stopped = pair.rpc.is_draining() && pair.gateway.is_draining();
        if self.inner.drain_gate.in_flight() == 0 && !stopped {
            if let Some(exit) = &first {
                tracing::warn!(transport = %exit.transport, "Transport exited, stopping the other");
            }
            metrics::record_shutdown("transport_exit");
            pair.teardown(self.inner.plan.grace()).await;
        }

        self.inner.drain_gate.wait_idle().await;
        let _ = rpc_task.await;
        let _ = gateway_task.await;

        match first {
            Some(TransportExit {
                transport,
                result: Err(source),
            }) => Err(SupervisorError::Transport { transport, source }),
            Some(_) => Ok(()),
            None => {
                tracing::warn!("Both transports ended without reporting an outcome");
                Ok(())
            }
        }
    }

    /// Bind every service to both transports. Nothing listens until this
    /// has succeeded for all of them.
    fn bind(&self, registry: &ServiceRegistry) -> Result<(Router, Router), SupervisorError> {
        let config = &self.inner.config;

        let mut registrar = RpcRegistrar::new();
        for entry in registry.iter() {
            entry
                .service()
                .bind_rpc(&mut registrar)
                .map_err(|source| SupervisorError::Bind {
                    service: entry.name().to_string(),
                    transport: TransportKind::Rpc,
                    source,
                })?;
        }

        let rpc_address = config.rpc_address();
        let endpoint = RpcEndpoint::for_listen_address(&rpc_address).map_err(|source| {
            SupervisorError::Endpoint {
                address: rpc_address.clone(),
                source,
            }
        })?;

        let matcher = HeaderMatcher::new(
            &config.gateway.header_prefixes,
            &config.gateway.trace_header_name,
        );
        let mut mux = GatewayMux::new(matcher);
        for entry in registry.iter() {
            entry
                .service()
                .bind_gateway(&mut mux, &endpoint)
                .map_err(|source| SupervisorError::Bind {
                    service: entry.name().to_string(),
                    transport: TransportKind::Gateway,
                    source,
                })?;
        }

        let openapi = lock(&self.inner.openapi).take();
        let gateway = gateway_router(
            mux.into_router(),
            &config.gateway,
            openapi,
            self.inner.prometheus.clone(),
        )?;

        tracing::info!(
            services = registry.len(),
            rpc_services = ?registrar.service_names(),
            reflection = !config.rpc.disable_reflection,
            rpc_endpoint = endpoint.address(),
            "Services bound"
        );
        let rpc = registrar.into_router(!config.rpc.disable_reflection)?;
        Ok((rpc, gateway))
    }

    fn release_closers(&self) {
        let closers = std::mem::take(&mut *lock(&self.inner.closers));
        for closer in closers {
            tracing::info!(closer = closer.name(), "Closing");
            closer.close();
        }
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("plan", &self.inner.plan)
            .field("drains_in_flight", &self.drains_in_flight())
            .finish()
    }
}

impl TransportPair {
    /// Close the gateway in the background, then stop the RPC transport:
    /// graceful for at most `grace`, forced unconditionally afterwards.
    async fn teardown(&self, grace: Duration) {
        self.gateway.begin_shutdown();
        let gateway = self.gateway.clone();
        tokio::spawn(async move {
            let draining = gateway.clone();
            if bounded_graceful_stop(grace, async move { draining.shutdown().await }).await
                == StopOutcome::TimedOut
            {
                tracing::debug!(grace = ?grace, "Gateway graceful close timed out");
            }
            gateway.force_stop().await;
        });

        let rpc = self.rpc.clone();
        match bounded_graceful_stop(grace, async move { rpc.shutdown().await }).await {
            StopOutcome::Completed => tracing::info!("RPC graceful shutdown complete"),
            StopOutcome::TimedOut => {
                tracing::warn!(grace = ?grace, "RPC graceful shutdown timed out, forcing shutdown")
            }
        }
        self.rpc.force_stop().await;
    }
}

fn rpc_connection_options(config: &RpcConfig) -> ConnectionOptions {
    let secs = |s: u64| (s > 0).then(|| Duration::from_secs(s));
    ConnectionOptions {
        max_age: secs(config.max_connection_age_secs),
        max_age_grace: secs(config.max_connection_age_grace_secs),
        max_idle: secs(config.max_connection_idle_secs),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::service::{BindError, HealthReporter};

    fn config() -> ServerConfig {
        let mut config = ServerConfig::default();
        config.listener.host = "127.0.0.1".to_string();
        config.shutdown.healthcheck_wait_secs = 0;
        config.shutdown.disable_signal_handler = true;
        config
    }

    #[derive(Default)]
    struct Counting {
        fails: AtomicUsize,
    }

    impl Service for Counting {
        fn name(&self) -> &str {
            "counting"
        }
        fn bind_rpc(&self, _: &mut RpcRegistrar) -> Result<(), BindError> {
            Ok(())
        }
        fn bind_gateway(&self, _: &mut GatewayMux, _: &RpcEndpoint) -> Result<(), BindError> {
            Ok(())
        }
        fn health_reporter(self: Arc<Self>) -> Option<Arc<dyn HealthReporter>> {
            Some(self)
        }
    }

    impl HealthReporter for Counting {
        fn fail_check(&self, _: bool) {
            self.fails.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Failing;

    impl Service for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        fn bind_rpc(&self, _: &mut RpcRegistrar) -> Result<(), BindError> {
            Ok(())
        }
        fn bind_gateway(&self, _: &mut GatewayMux, _: &RpcEndpoint) -> Result<(), BindError> {
            Err("no handlers".into())
        }
    }

    #[tokio::test]
    async fn stop_before_run_skips_transports() {
        let supervisor = Supervisor::new(config());
        let svc = Arc::new(Counting::default());
        supervisor.set_service(svc.clone()).unwrap();

        tokio::time::timeout(Duration::from_secs(1), supervisor.stop(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(svc.fails.load(Ordering::SeqCst), 1);
        assert_eq!(supervisor.drains_in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn healthcheck_wait_is_honored() {
        let mut config = config();
        config.shutdown.healthcheck_wait_secs = 3;
        let supervisor = Supervisor::new(config);

        let start = tokio::time::Instant::now();
        supervisor.stop(Duration::from_secs(1)).await;
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn bind_failure_aborts_run_and_closes_registry() {
        let supervisor = Supervisor::new(config());
        supervisor.set_service(Arc::new(Failing)).unwrap();

        let closed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&closed);
        supervisor.add_closer(Closer::new("counter", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let err = supervisor.run().await.unwrap_err();
        match &err {
            SupervisorError::Bind {
                service, transport, ..
            } => {
                assert_eq!(service, "failing");
                assert_eq!(*transport, TransportKind::Gateway);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(closed.load(Ordering::SeqCst), 1);

        assert_eq!(
            supervisor.set_service(Arc::new(Counting::default())),
            Err(RegistrationError::RegistryClosed)
        );
        assert!(matches!(supervisor.run().await, Err(SupervisorError::AlreadyStarted)));
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn connection_age_options() {
        let options = rpc_connection_options(&RpcConfig {
            max_connection_age_secs: 30,
            max_connection_age_grace_secs: 0,
            max_connection_idle_secs: 120,
            disable_reflection: false,
        });
        assert_eq!(options.max_age, Some(Duration::from_secs(30)));
        assert_eq!(options.max_age_grace, None);
        assert_eq!(options.max_idle, Some(Duration::from_secs(120)));
    }
}
