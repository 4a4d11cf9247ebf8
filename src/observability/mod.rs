//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!     → tracing.rs (per-request spans with trace ids)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON)
//!     → /metrics on the gateway (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Trace id flows from the gateway into RPC metadata
//! - Nothing here installs process-wide state implicitly; the embedding
//!   binary decides when to install the logger and the recorder

pub mod logging;
pub mod metrics;
pub mod tracing;
