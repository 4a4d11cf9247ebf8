use axum::http::header::InvalidHeaderName;
use thiserror::Error;

use crate::net::{ListenerError, TransportKind};
use crate::service::BindError;

/// Why `Supervisor::run` returned an error.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A service binder failed; nothing was listening yet.
    #[error("service `{service}` failed to bind to the {transport} transport: {source}")]
    Bind {
        service: String,
        transport: TransportKind,
        #[source]
        source: BindError,
    },

    /// The first transport to exit did so with an error.
    #[error("{transport} transport failed: {source}")]
    Transport {
        transport: TransportKind,
        #[source]
        source: ListenerError,
    },

    #[error("invalid RPC endpoint `{address}`: {source}")]
    Endpoint {
        address: String,
        #[source]
        source: tonic::transport::Error,
    },

    /// A registered descriptor set could not be served through reflection.
    #[error("gRPC reflection: {0}")]
    Reflection(#[from] tonic_reflection::server::Error),

    #[error("invalid trace header name: {0}")]
    TraceHeader(#[from] InvalidHeaderName),

    #[error("supervisor has already been started")]
    AlreadyStarted,
}

impl SupervisorError {
    /// The transport this error belongs to, if any.
    pub fn transport(&self) -> Option<TransportKind> {
        match self {
            SupervisorError::Bind { transport, .. } | SupervisorError::Transport { transport, .. } => {
                Some(*transport)
            }
            SupervisorError::Endpoint { .. } | SupervisorError::Reflection(_) => {
                Some(TransportKind::Rpc)
            }
            SupervisorError::TraceHeader(_) => Some(TransportKind::Gateway),
            SupervisorError::AlreadyStarted => None,
        }
    }
}
