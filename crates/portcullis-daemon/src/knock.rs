//! Knock listeners
//!
//! One listener per decoy port. The TCP handshake itself is the signal: the
//! accepted connection is closed without reading a byte.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::state::DaemonState;

/// Listener for knock attempts on a single decoy port
pub struct KnockListener {
    port: u16,
    state: Arc<DaemonState>,
    cancel: CancellationToken,
}

impl KnockListener {
    /// Create a listener for one decoy port
    pub fn new(port: u16, state: Arc<DaemonState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the accept loop until shutdown.
    ///
    /// A bind failure is fatal to this listener only; the caller logs it and
    /// the remaining decoy ports keep their listeners.
    pub async fn run(self) -> Result<()> {
        let addr = self.state.config.knock_address(self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind knock listener to {}", addr))?;

        tracing::info!("Knock listener active on {}", addr);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::debug!("Knock listener on port {} shutting down", self.port);
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let ip = peer.ip();
                            tracing::debug!("Knock detected on port {} from {}", self.port, ip);

                            if self.state.admission.record_knock(ip, self.port) {
                                tracing::info!("Valid knock sequence from {}", ip);
                            }

                            // The handshake is the signal; no payload is read
                            drop(stream);
                        }
                        Err(e) => {
                            tracing::error!("Accept error on knock port {}: {}", self.port, e);
                        }
                    }
                }
            }
        }

        Ok(())
    }
}
