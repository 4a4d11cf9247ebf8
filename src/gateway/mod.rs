//! HTTP gateway transport binding.
//!
//! # Data Flow
//! ```text
//! Service::bind_gateway(&mut GatewayMux, &RpcEndpoint)
//!     → service routes (usually calling the RPC transport over loopback)
//!     → stack.rs: admin surfaces + request span, trace id, gzip, metrics
//!     → net::serve (HTTP/1.1 and HTTP/2)
//!
//! Request precedence:
//!     <swagger_url>/*  → OpenAPI handler (prefix stripped)
//!     /metrics         → Prometheus text exposition
//!     everything else  → service routes
//! ```
//!
//! # Design Decisions
//! - Headers are forwarded to RPC metadata through an explicit allow-list
//!   (`HeaderMatcher`) so hop-by-hop headers never reach services
//! - Two binders claiming the same path is a bind error, never a panic
//! - Admin surfaces sit outside the service middleware and are not counted
//!   as gateway requests

pub mod headers;
pub mod mux;
pub mod stack;

pub use headers::HeaderMatcher;
pub use mux::{GatewayMux, RouteError};
pub use stack::gateway_router;
