//! Assembly of the router served by the gateway transport.

use axum::http::header::InvalidHeaderName;
use axum::http::HeaderName;
use axum::middleware;
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::compression::CompressionLayer;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::observability::metrics::track_requests;
use crate::observability::tracing::{GatewaySpan, TraceIdGenerator};

/// Build the gateway router: admin surfaces first, then the service mux.
///
/// `services` is the router collected from every `bind_gateway` call.
pub fn gateway_router(
    services: Router,
    config: &GatewayConfig,
    openapi: Option<Router>,
    prometheus: Option<PrometheusHandle>,
) -> Result<Router, InvalidHeaderName> {
    let trace_header = HeaderName::from_bytes(config.trace_header_name.as_bytes())?;

    // Layers wrap outward: the last one added sees the request first.
    let mut services = services;
    if config.compression {
        services = services.layer(CompressionLayer::new());
    }
    let services = services
        .layer(middleware::from_fn(track_requests))
        .layer(TraceLayer::new_for_http().make_span_with(GatewaySpan::new(trace_header.clone())))
        .layer(PropagateRequestIdLayer::new(trace_header.clone()))
        .layer(SetRequestIdLayer::new(trace_header, TraceIdGenerator));

    let mut router = Router::new();

    if let Some(openapi) = openapi.filter(|_| !config.disable_swagger) {
        let prefix = config.swagger_url.trim_end_matches('/');
        if prefix.is_empty() {
            tracing::warn!(swagger_url = %config.swagger_url, "OpenAPI handler needs a non-root prefix, skipping");
        } else {
            tracing::debug!(prefix, "OpenAPI handler mounted");
            router = router.nest_service(prefix, openapi);
        }
    }

    if let Some(handle) = prometheus.filter(|_| !config.disable_prometheus) {
        router = router.route(
            "/metrics",
            get(move || {
                let handle = handle.clone();
                async move { handle.render() }
            }),
        );
    }

    Ok(router.fallback_service(services))
}
