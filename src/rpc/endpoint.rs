//! Loopback dial target given to gateway binders.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use tonic::transport::{Channel, Endpoint};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Where gateway handlers reach the RPC transport, plus the dial options to use.
#[derive(Debug, Clone)]
pub struct RpcEndpoint {
    address: String,
    endpoint: Endpoint,
}

impl RpcEndpoint {
    /// Build the dial target for an RPC transport listening on `listen_address`.
    ///
    /// An unspecified listen host (`0.0.0.0`, `::`) is dialed via loopback.
    pub fn for_listen_address(listen_address: &str) -> Result<Self, tonic::transport::Error> {
        let address = dial_address(listen_address);
        let endpoint = Endpoint::from_shared(format!("http://{}", address))?
            .connect_timeout(CONNECT_TIMEOUT)
            .tcp_nodelay(true);
        Ok(Self { address, endpoint })
    }

    /// host:port of the RPC transport.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The configured tonic endpoint, for callers that need custom settings.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// A channel that connects on first use.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn channel(&self) -> Channel {
        self.endpoint.connect_lazy()
    }
}

fn dial_address(listen_address: &str) -> String {
    match listen_address.parse::<SocketAddr>() {
        Ok(addr) if addr.ip().is_unspecified() => {
            let loopback = match addr.ip() {
                IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::LOCALHOST),
            };
            SocketAddr::new(loopback, addr.port()).to_string()
        }
        _ => listen_address.to_string(),
    }
}
