//! Command gate
//!
//! Single listener on the command port. Connections from addresses holding
//! an authorization are handed to a session task; everything else is closed
//! unread and unanswered, so a prober sees nothing that distinguishes the
//! gate from a dead port.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::server::session::CommandSession;
use crate::state::DaemonState;

/// Gate admitting authorized addresses to command sessions
pub struct CommandGate {
    state: Arc<DaemonState>,
    cancel: CancellationToken,
    /// Tracks session tasks so shutdown can wait for them to drain
    sessions: TaskTracker,
}

impl CommandGate {
    /// Create the gate
    pub fn new(state: Arc<DaemonState>, cancel: CancellationToken, sessions: TaskTracker) -> Self {
        Self {
            state,
            cancel,
            sessions,
        }
    }

    /// Run the accept loop until shutdown
    pub async fn run(&self) -> Result<()> {
        let addr = self.state.config.command_address();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind command listener to {}", addr))?;

        tracing::info!("Command listener active on {}", addr);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("Command listener shutting down");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, peer)) => self.admit(stream, peer),
                        Err(e) => {
                            tracing::error!("Accept error on command port: {}", e);
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Admit or silently drop one incoming connection
    fn admit(&self, stream: TcpStream, peer: SocketAddr) {
        let ip = peer.ip();

        if !self.state.admission.is_authorized(ip) {
            // Closed without a single byte written
            tracing::warn!("Unauthorized connection attempt from {}", ip);
            return;
        }

        tracing::info!("Authorized connection from {}", ip);

        let state = Arc::clone(&self.state);
        self.sessions.spawn(async move {
            CommandSession::new(stream, ip, state).run().await;
        });
    }
}
