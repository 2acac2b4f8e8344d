use std::net::{Ipv4Addr, SocketAddr};

use chatbridge_core::BackendConfig;

pub const DEFAULT_PORT: u16 = 26667;
pub const DEFAULT_SERVER_NAME: &str = "lingr";
pub const DEFAULT_HOST: &str = "lingr.com";

/// Everything one gateway instance needs: where to listen, how to present
/// itself to IRC clients, and the backend settings handed to every
/// connection it starts.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub listen: SocketAddr,
    /// Source of numeric replies (`:lingr 001 ...`).
    pub server_name: String,
    /// Host part of synthesized `nick!nick@host` prefixes.
    pub host: String,
    pub backend: BackendConfig,
}

impl GatewayConfig {
    pub fn new(listen: SocketAddr, backend: BackendConfig) -> Self {
        Self {
            listen,
            server_name: DEFAULT_SERVER_NAME.into(),
            host: DEFAULT_HOST.into(),
            backend,
        }
    }

    /// Loopback on the default port.
    pub fn default_listen() -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT))
    }
}
