//! Backend services and their lifecycle capabilities.
//!
//! # Responsibilities
//! - The contract every backend service implements (bind to both transports)
//! - Optional capabilities: health reporting and draining
//! - Ordered registry with capabilities resolved once, at registration
//!
//! # Design Decisions
//! - Capabilities are discovered through `self: Arc<Self>` accessors instead of
//!   runtime type probing, so the registry stores plain optional references
//! - `Drainable::stop` may be called more than once when several shutdowns
//!   overlap; implementations must be idempotent

pub mod health;
pub mod registry;

use std::sync::Arc;

use crate::gateway::GatewayMux;
use crate::rpc::{RpcEndpoint, RpcRegistrar};

pub use health::HealthService;
pub use registry::{RegisteredService, RegistrationError, ServiceRegistry};

/// Error returned by a service binder.
pub type BindError = Box<dyn std::error::Error + Send + Sync>;

/// A backend service served on both transports.
pub trait Service: Send + Sync + 'static {
    /// Name used in logs and bind errors.
    fn name(&self) -> &str;

    /// Register RPC handlers.
    fn bind_rpc(&self, registrar: &mut RpcRegistrar) -> Result<(), BindError>;

    /// Register gateway handlers. `endpoint` is how they reach the RPC transport.
    fn bind_gateway(&self, mux: &mut GatewayMux, endpoint: &RpcEndpoint) -> Result<(), BindError>;

    /// Return `Some(self)` if the service reports health.
    fn health_reporter(self: Arc<Self>) -> Option<Arc<dyn HealthReporter>> {
        None
    }

    /// Return `Some(self)` if the service must be stopped during shutdown.
    fn drainable(self: Arc<Self>) -> Option<Arc<dyn Drainable>> {
        None
    }
}

/// A service that can fail external health checks ahead of shutdown.
pub trait HealthReporter: Send + Sync {
    fn fail_check(&self, failing: bool);
}

/// A service with its own work to stop once the RPC transport is down.
pub trait Drainable: Send + Sync {
    fn stop(&self);
}
