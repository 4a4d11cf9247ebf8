//! Built-in liveness and readiness endpoints.
//!
//! `/healthcheck` answers 200 while the process is up. `/readycheck` answers
//! 200 until the supervisor starts draining, then 503, so load balancers stop
//! routing new work here before the listeners close.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use serde::Serialize;

use crate::config::ObservabilityConfig;
use crate::gateway::GatewayMux;
use crate::rpc::{RpcEndpoint, RpcRegistrar};
use crate::service::{BindError, HealthReporter, Service};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BuildInfo {
    pub app: String,
    pub environment: String,
    pub release: String,
    pub version: &'static str,
}

impl BuildInfo {
    pub fn from_config(config: &ObservabilityConfig) -> Self {
        Self {
            app: config.app_name.clone(),
            environment: config.environment.clone(),
            release: config.release_name.clone(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

#[derive(Debug, Serialize)]
struct Readiness {
    status: &'static str,
}

#[derive(Debug)]
pub struct HealthService {
    info: BuildInfo,
    failing: Arc<AtomicBool>,
}

impl HealthService {
    pub fn new(info: BuildInfo) -> Self {
        Self {
            info,
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_failing(&self) -> bool {
        self.failing.load(Ordering::SeqCst)
    }
}

impl Service for HealthService {
    fn name(&self) -> &str {
        "health"
    }

    fn bind_rpc(&self, _registrar: &mut RpcRegistrar) -> Result<(), BindError> {
        Ok(())
    }

    fn bind_gateway(&self, mux: &mut GatewayMux, _endpoint: &RpcEndpoint) -> Result<(), BindError> {
        let info = self.info.clone();
        mux.route(
            "/healthcheck",
            get(move || {
                let info = info.clone();
                async move { Json(info) }
            }),
        )?;

        let failing = Arc::clone(&self.failing);
        mux.route(
            "/readycheck",
            get(move || {
                let failing = failing.load(Ordering::SeqCst);
                async move { readiness(failing) }
            }),
        )?;
        Ok(())
    }

    fn health_reporter(self: Arc<Self>) -> Option<Arc<dyn HealthReporter>> {
        Some(self)
    }
}

impl HealthReporter for HealthService {
    fn fail_check(&self, failing: bool) {
        let was = self.failing.swap(failing, Ordering::SeqCst);
        if was != failing {
            tracing::info!(failing, "Readiness changed");
        }
    }
}

fn readiness(failing: bool) -> impl IntoResponse {
    if failing {
        (StatusCode::SERVICE_UNAVAILABLE, Json(Readiness { status: "draining" }))
    } else {
        (StatusCode::OK, Json(Readiness { status: "ready" }))
    }
}
