//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define lifecycle and gateway metrics
//! - Build the Prometheus recorder the binary hands to the supervisor
//! - Periodic recorder upkeep
//!
//! # Metrics
//! - `tandem_transport_exits_total` (counter): serve loop exits by transport, outcome
//! - `tandem_connections_active` (gauge): open connections per transport
//! - `tandem_shutdowns_total` (counter): shutdowns by trigger
//! - `tandem_drains_in_flight` (gauge): concurrent Stop calls
//! - `tandem_drain_duration_seconds` (histogram): Stop latency
//! - `tandem_graceful_stop_timeouts_total` (counter): graceful stops that hit the deadline
//! - `tandem_gateway_requests_total` (counter): gateway requests by method, status
//! - `tandem_gateway_request_duration_seconds` (histogram): gateway latency
//!
//! # Design Decisions
//! - The library never installs a global recorder; callers pass a handle in
//! - Without an installed recorder every update is a no-op

use std::time::{Duration, Instant};

use axum::{extract::Request, middleware::Next, response::Response};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tokio::task::JoinHandle;

use crate::net::TransportKind;

/// Install the Prometheus recorder as the process-wide metrics sink.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Run recorder upkeep (histogram draining) on an interval until aborted.
pub fn spawn_upkeep(handle: PrometheusHandle, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            handle.run_upkeep();
        }
    })
}

pub fn record_transport_exit(transport: TransportKind, ok: bool) {
    let outcome = if ok { "closed" } else { "error" };
    counter!(
        "tandem_transport_exits_total",
        "transport" => transport.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn connection_opened(transport: TransportKind) {
    gauge!("tandem_connections_active", "transport" => transport.as_str()).increment(1.0);
}

pub fn connection_closed(transport: TransportKind) {
    gauge!("tandem_connections_active", "transport" => transport.as_str()).decrement(1.0);
}

pub fn record_shutdown(trigger: &'static str) {
    counter!("tandem_shutdowns_total", "trigger" => trigger).increment(1);
}

pub fn set_drains_in_flight(count: usize) {
    gauge!("tandem_drains_in_flight").set(count as f64);
}

pub fn record_drain_duration(start: Instant) {
    histogram!("tandem_drain_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_graceful_stop_timeout() {
    counter!("tandem_graceful_stop_timeouts_total").increment(1);
}

/// Record a completed gateway request.
pub fn record_gateway_request(method: &str, status: u16, start: Instant) {
    let duration = start.elapsed().as_secs_f64();
    counter!(
        "tandem_gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "tandem_gateway_request_duration_seconds",
        "method" => method.to_string()
    )
    .record(duration);
}

/// Axum middleware recording request count and latency.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let response = next.run(request).await;
    record_gateway_request(method.as_str(), response.status().as_u16(), start);
    response
}
