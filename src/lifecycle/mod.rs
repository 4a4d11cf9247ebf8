//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (supervisor.rs):
//!     Register services → Run → bind all → start RPC + gateway
//!
//! Exit (fanin.rs):
//!     First transport outcome → teardown → wait for drains → closers
//!
//! Shutdown (supervisor.rs, bounded.rs, drain.rs):
//!     Stop → fail health checks → wait → close gateway
//!          → bounded RPC graceful stop → forced stop → stop services
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Stop with the configured grace
//! ```
//!
//! # Design Decisions
//! - Stop is idempotent and may overlap with itself; the drain gate keeps
//!   Run from releasing closers while any Stop is still running
//! - Graceful stop always has a deadline and is always followed by a forced
//!   stop, so shutdown latency is bounded
//! - Either transport exiting stops the other

pub mod bounded;
pub mod closer;
pub mod drain;
pub mod error;
pub mod fanin;
pub mod plan;
pub mod signals;
pub mod supervisor;

pub use bounded::{bounded_graceful_stop, StopOutcome};
pub use closer::Closer;
pub use drain::{DrainGate, DrainPermit};
pub use error::SupervisorError;
pub use fanin::{ErrorFanIn, TransportExit};
pub use plan::ShutdownPlan;
pub use signals::SignalWatcher;
pub use supervisor::{BoundAddrs, Supervisor};
