//! RPC (gRPC) transport binding.
//!
//! # Data Flow
//! ```text
//! Service::bind_rpc(&mut RpcRegistrar)
//!     → tonic routes (one per generated server type)
//!     → + reflection v1/v1alpha unless `rpc.disable_reflection`
//!     → axum router with gRPC trace layer
//!     → net::serve (HTTP/2 prior knowledge)
//!
//! Gateway handlers
//!     → RpcEndpoint::channel() (lazy loopback connection)
//!     → RPC transport
//! ```
//!
//! # Design Decisions
//! - tonic only provides routing and codecs; the connection loop is ours so
//!   graceful and forced stop behave the same on both transports
//! - The gateway dials the RPC listener over loopback rather than calling
//!   handlers in-process, so both paths see identical middleware

pub mod endpoint;
pub mod registrar;

pub use endpoint::RpcEndpoint;
pub use registrar::RpcRegistrar;
