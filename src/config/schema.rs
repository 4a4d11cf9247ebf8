//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the supervisor.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::lifecycle::ShutdownPlan;

/// Grace period used by the signal watcher when `shutdown.grace_secs` is 0.
pub const DEFAULT_SIGNAL_GRACE: Duration = Duration::from_secs(10);

/// Root configuration for the supervisor.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (host, ports, connection limit).
    pub listener: ListenerConfig,

    /// Shutdown timings and signal handling.
    pub shutdown: ShutdownConfig,

    /// RPC transport connection settings.
    pub rpc: RpcConfig,

    /// Gateway transport settings.
    pub gateway: GatewayConfig,

    /// Logging and service identity.
    pub observability: ObservabilityConfig,
}

impl ServerConfig {
    /// Address the RPC transport listens on.
    pub fn rpc_address(&self) -> String {
        join_host_port(&self.listener.host, self.listener.grpc_port)
    }

    /// Address the gateway transport listens on.
    pub fn gateway_address(&self) -> String {
        join_host_port(&self.listener.host, self.listener.http_port)
    }
}

fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// Listener configuration shared by both transports.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Host to listen on (e.g., "0.0.0.0").
    pub host: String,

    /// RPC transport port.
    pub grpc_port: u16,

    /// Gateway transport port.
    pub http_port: u16,

    /// Maximum concurrent connections per transport (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            grpc_port: 9090,
            http_port: 9091,
            max_connections: 10_000,
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Time allowed for in-flight calls to complete once draining starts.
    pub grace_secs: u64,

    /// Time to wait after failing health checks so routers notice before
    /// the listeners close. 0 disables the wait.
    pub healthcheck_wait_secs: u64,

    /// Do not install the SIGTERM/SIGINT watcher.
    pub disable_signal_handler: bool,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_secs: 15,
            healthcheck_wait_secs: 7,
            disable_signal_handler: false,
        }
    }
}

impl ShutdownConfig {
    /// Snapshot the configured durations.
    pub fn plan(&self) -> ShutdownPlan {
        let grace = if self.grace_secs > 0 {
            Duration::from_secs(self.grace_secs)
        } else {
            DEFAULT_SIGNAL_GRACE
        };
        let healthcheck_wait = (self.healthcheck_wait_secs > 0)
            .then(|| Duration::from_secs(self.healthcheck_wait_secs));
        ShutdownPlan::new(grace, healthcheck_wait)
    }
}

/// RPC transport connection management.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct RpcConfig {
    /// Maximum lifetime of a connection before it is asked to drain. 0 disables.
    pub max_connection_age_secs: u64,

    /// Additional time a draining aged connection gets before it is closed. 0 disables.
    pub max_connection_age_grace_secs: u64,

    /// Ask a connection with no request in flight for this long to drain. 0 disables.
    pub max_connection_idle_secs: u64,

    /// Do not register the gRPC server reflection services.
    pub disable_reflection: bool,
}

/// Gateway transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    /// Do not serve the OpenAPI handler.
    pub disable_swagger: bool,

    /// Path prefix the OpenAPI handler is served under.
    pub swagger_url: String,

    /// Do not serve `/metrics`.
    pub disable_prometheus: bool,

    /// Header carrying the trace id; recorded on request spans and forwarded to RPC metadata.
    pub trace_header_name: String,

    /// HTTP header prefixes forwarded to RPC metadata unchanged.
    pub header_prefixes: Vec<String>,

    /// Gzip responses from service handlers.
    pub compression: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            disable_swagger: false,
            swagger_url: "/swagger/".to_string(),
            disable_prometheus: false,
            trace_header_name: "x-trace-id".to_string(),
            header_prefixes: Vec::new(),
            compression: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Application name, attached to logs and build info.
    pub app_name: String,

    /// Deployment environment (e.g., production, staging).
    pub environment: String,

    /// Release identifier (e.g., v1.2.0).
    pub release_name: String,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            app_name: String::new(),
            environment: String::new(),
            release_name: String::new(),
            log_level: "info".to_string(),
            json_logs: true,
        }
    }
}
