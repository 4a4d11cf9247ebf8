//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits, accept backoff)
//!     → connection.rs (lifecycle tracking)
//!     → server.rs (HTTP/1 + HTTP/2 via hyper, served by an axum router)
//!
//! Connection States:
//!     Active → Draining → Closed
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked so graceful stop can wait for the last one
//! - Forced stop drops connections instead of waiting for peers
//! - Both transports share this layer; only the router and options differ

use std::fmt;

pub mod backoff;
pub mod connection;
pub mod listener;
pub mod server;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{Listener, ListenerError};
pub use server::{serve, ConnectionOptions, ServerHandle};

/// Which of the two transports a value refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// The binary RPC (gRPC) transport.
    Rpc,
    /// The HTTP gateway transport.
    Gateway,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Rpc => "rpc",
            TransportKind::Gateway => "gateway",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
