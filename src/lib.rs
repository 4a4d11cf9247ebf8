//! Lifecycle supervisor for a gRPC server and its HTTP gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────────────────── Supervisor ─────────────────────────────┐
//!   │                                                                      │
//!   │  ServiceRegistry ──bind_rpc──────▶ RpcRegistrar ──▶ RPC transport ───┼──▶ gRPC clients
//!   │        │                                                 ▲           │
//!   │        └────────bind_gateway──▶ GatewayMux               │ loopback  │
//!   │                                   │                      │           │
//!   │          admin surfaces ─────────▶ gateway router ──▶ gateway ───────┼──▶ HTTP clients
//!   │                                                                      │
//!   │  ErrorFanIn ◀── both serve tasks        DrainGate ◀── Stop callers   │
//!   │  SignalWatcher ──▶ Stop                 Closers ──▶ run once at exit │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tandem::{HealthService, ServerConfig, Supervisor};
//! use tandem::service::health::BuildInfo;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::default();
//! let supervisor = Supervisor::new(config.clone());
//! supervisor.set_service(Arc::new(HealthService::new(BuildInfo::from_config(
//!     &config.observability,
//! ))))?;
//!
//! let stopper = supervisor.clone();
//! tokio::spawn(async move {
//!     tokio::time::sleep(Duration::from_secs(60)).await;
//!     stopper.stop(Duration::from_secs(5)).await;
//! });
//! supervisor.run().await?;
//! # Ok(())
//! # }
//! ```

// Core subsystems
pub mod config;
pub mod lifecycle;
pub mod net;

// Transports
pub mod gateway;
pub mod rpc;
pub mod service;

// Cross-cutting concerns
pub mod observability;

pub use config::ServerConfig;
pub use lifecycle::{Closer, Supervisor, SupervisorError};
pub use service::{Drainable, HealthReporter, HealthService, Service};
