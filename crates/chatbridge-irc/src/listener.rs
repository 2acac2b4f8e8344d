// ── TCP listener ──
//
// Accepts IRC clients and runs a `ClientSession` per socket on its own
// task. Each session gets a child of the shutdown token, so cancelling it
// closes every client and destroys their backend sessions.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::session::ClientSession;

pub struct Listener {
    listener: TcpListener,
    config: Arc<GatewayConfig>,
}

impl Listener {
    /// Bind `config.listen`. Port 0 picks a free port; see [`local_addr`](Self::local_addr).
    pub async fn bind(config: GatewayConfig) -> Result<Self, GatewayError> {
        let addr = config.listen;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| GatewayError::Bind { addr, source })?;
        Ok(Self {
            listener,
            config: Arc::new(config),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, GatewayError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept clients until `shutdown` fires, then wait for every session
    /// to finish tearing down.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<(), GatewayError> {
        info!(addr = %self.local_addr()?, "gateway listening");
        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        info!(%peer, "client connected");
                        if let Err(e) = stream.set_nodelay(true) {
                            debug!(%peer, error = %e, "cannot set TCP_NODELAY");
                        }
                        let session = ClientSession::new(Arc::clone(&self.config), shutdown.child_token());
                        sessions.spawn(
                            async move {
                                if let Err(e) = session.run(stream).await {
                                    warn!(error = %e, "client session failed");
                                }
                            }
                            .instrument(info_span!("client", %peer)),
                        );
                    }
                    Err(e) => warn!(error = %e, "failed to accept client"),
                },
                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "client task panicked");
                    }
                }
            }
        }

        info!(open = sessions.len(), "shutting down, closing clients");
        while let Some(joined) = sessions.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "client task panicked");
            }
        }
        Ok(())
    }
}
