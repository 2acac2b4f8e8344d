use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use crate::outbound::Closed;

/// Errors from the IRC side of the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Cannot listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Client I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Closed(#[from] Closed),
}
