//! Shared utilities for supervisor integration tests.
#![allow(dead_code)]

use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use axum::routing::get;
use tandem::config::ServerConfig;
use tandem::gateway::GatewayMux;
use tandem::rpc::{RpcEndpoint, RpcRegistrar};
use tandem::service::BindError;
use tandem::{Drainable, HealthReporter, Service, Supervisor};

/// A port that was free a moment ago.
pub fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Loopback config on fresh ports, no signal handler, no health-check wait.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.host = "127.0.0.1".to_string();
    config.listener.grpc_port = free_port();
    config.listener.http_port = loop {
        let port = free_port();
        if port != config.listener.grpc_port {
            break port;
        }
    };
    config.shutdown.healthcheck_wait_secs = 0;
    config.shutdown.disable_signal_handler = true;
    config
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// Run the supervisor in the background and wait for both listeners.
pub async fn start(
    supervisor: &Supervisor,
) -> (
    tandem::lifecycle::BoundAddrs,
    tokio::task::JoinHandle<Result<(), tandem::SupervisorError>>,
) {
    let runner = supervisor.clone();
    let task = tokio::spawn(async move { runner.run().await });
    let addrs = tokio::time::timeout(Duration::from_secs(5), supervisor.wait_listening())
        .await
        .expect("transports should start")
        .expect("transports should bind");
    (addrs, task)
}

/// Connection refused on `addr`.
pub async fn is_closed(addr: SocketAddr) -> bool {
    tokio::net::TcpStream::connect(addr).await.is_err()
}

/// Ordered record of lifecycle callbacks across services.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|e| *e == event).count()
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.0.lock().unwrap().iter().position(|e| e == event)
    }
}

/// A service with every capability that records its callbacks.
///
/// Gateway routes: `/v1/<name>` answers the name, `/v1/<name>/slow` answers
/// after 300ms, `/v1/<name>/hang` never answers.
pub struct RecordingService {
    name: String,
    log: EventLog,
    endpoint: OnceLock<RpcEndpoint>,
}

impl RecordingService {
    pub fn new(name: &str, log: &EventLog) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            log: log.clone(),
            endpoint: OnceLock::new(),
        })
    }

    /// The RPC endpoint this service was handed at bind time.
    pub fn endpoint(&self) -> Option<&RpcEndpoint> {
        self.endpoint.get()
    }
}

impl Service for RecordingService {
    fn name(&self) -> &str {
        &self.name
    }

    fn bind_rpc(&self, _registrar: &mut RpcRegistrar) -> Result<(), BindError> {
        self.log.push(format!("bind_rpc:{}", self.name));
        Ok(())
    }

    fn bind_gateway(&self, mux: &mut GatewayMux, endpoint: &RpcEndpoint) -> Result<(), BindError> {
        self.log.push(format!("bind_gateway:{}", self.name));
        let _ = self.endpoint.set(endpoint.clone());

        let name = self.name.clone();
        mux.route(
            &format!("/v1/{}", self.name),
            get(move || {
                let name = name.clone();
                async move { name }
            }),
        )?;
        mux.route(
            &format!("/v1/{}/slow", self.name),
            get(|| async {
                tokio::time::sleep(Duration::from_millis(300)).await;
                "slow"
            }),
        )?;
        mux.route(
            &format!("/v1/{}/hang", self.name),
            get(|| std::future::pending::<&'static str>()),
        )?;
        Ok(())
    }

    fn health_reporter(self: Arc<Self>) -> Option<Arc<dyn HealthReporter>> {
        Some(self)
    }

    fn drainable(self: Arc<Self>) -> Option<Arc<dyn Drainable>> {
        Some(self)
    }
}

impl HealthReporter for RecordingService {
    fn fail_check(&self, failing: bool) {
        if failing {
            self.log.push(format!("fail:{}", self.name));
        }
    }
}

impl Drainable for RecordingService {
    fn stop(&self) {
        self.log.push(format!("stop:{}", self.name));
    }
}

/// A service whose binder fails for one transport.
pub struct BrokenService {
    pub fail_rpc: bool,
}

impl Service for BrokenService {
    fn name(&self) -> &str {
        "broken"
    }

    fn bind_rpc(&self, _registrar: &mut RpcRegistrar) -> Result<(), BindError> {
        if self.fail_rpc {
            return Err("rpc binder failed".into());
        }
        Ok(())
    }

    fn bind_gateway(&self, _mux: &mut GatewayMux, _endpoint: &RpcEndpoint) -> Result<(), BindError> {
        Err("gateway binder failed".into())
    }
}

/// Serves the standard gRPC health service on the RPC transport.
pub struct GrpcHealth;

impl Service for GrpcHealth {
    fn name(&self) -> &str {
        "grpc-health"
    }

    fn bind_rpc(&self, registrar: &mut RpcRegistrar) -> Result<(), BindError> {
        let (_, server) = tonic_health::server::health_reporter();
        registrar
            .add_file_descriptor_set(tonic_health::pb::FILE_DESCRIPTOR_SET)
            .add_service(server);
        Ok(())
    }

    fn bind_gateway(&self, _mux: &mut GatewayMux, _endpoint: &RpcEndpoint) -> Result<(), BindError> {
        Ok(())
    }
}

/// Connected channel to the RPC transport at `addr`.
pub async fn rpc_channel(addr: SocketAddr) -> tonic::transport::Channel {
    let endpoint = tonic::transport::Endpoint::from_shared(format!("http://{}", addr)).unwrap();
    tokio::time::timeout(Duration::from_secs(2), endpoint.connect())
        .await
        .expect("RPC transport should accept connections")
        .unwrap()
}
