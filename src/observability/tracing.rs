//! Request spans and trace ids for the gateway.
//!
//! # Responsibilities
//! - Create one span per gateway request carrying method, path and trace id
//! - Generate a trace id when the caller did not send one
//!
//! # Design Decisions
//! - The trace header name is configurable; the same header is forwarded to
//!   RPC metadata by the header matcher so both transports log the same id
//! - Generated ids are UUID v4

use axum::http::{HeaderName, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use tower_http::trace::MakeSpan;
use tracing::Span;
use uuid::Uuid;

/// Span factory for gateway requests.
#[derive(Debug, Clone)]
pub struct GatewaySpan {
    trace_header: HeaderName,
}

impl GatewaySpan {
    pub fn new(trace_header: HeaderName) -> Self {
        Self { trace_header }
    }
}

impl<B> MakeSpan<B> for GatewaySpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let trace_id = request
            .headers()
            .get(&self.trace_header)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        tracing::info_span!(
            "gateway_request",
            method = %request.method(),
            path = %request.uri().path(),
            trace_id = %trace_id,
        )
    }
}

/// Generates a UUID v4 trace id for requests that arrive without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceIdGenerator;

impl MakeRequestId for TraceIdGenerator {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}
