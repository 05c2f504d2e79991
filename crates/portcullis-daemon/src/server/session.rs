//! Command session
//!
//! Owns one admitted connection for its lifetime. Frames are
//! newline-delimited JSON in both directions; a line that fails to decode
//! gets an error frame and the session continues. However the session ends,
//! the address's authorization is revoked exactly here, making each grant
//! good for one session only.

use std::net::IpAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

use portcullis_protocol::{
    CommandMessage, ExecutionResult, LineCodec, ProtocolError, ResponseMessage,
};

use crate::state::DaemonState;

const WELCOME: &str = "Connection established. Awaiting commands.";

/// Handler for one admitted command connection
pub struct CommandSession {
    framed: Framed<TcpStream, LineCodec>,
    peer: IpAddr,
    state: Arc<DaemonState>,
}

impl CommandSession {
    /// Wrap an admitted connection
    pub fn new(stream: TcpStream, peer: IpAddr, state: Arc<DaemonState>) -> Self {
        Self {
            framed: Framed::new(stream, LineCodec::new()),
            peer,
            state,
        }
    }

    /// Drive the session to completion and consume the peer's grant
    pub async fn run(mut self) {
        tracing::info!("Command session started with {}", self.peer);

        if let Err(e) = self.serve().await {
            tracing::warn!("Command session with {} ended with error: {}", self.peer, e);
        }

        self.state.admission.revoke(self.peer);
        tracing::info!("Command session ended with {}", self.peer);
    }

    async fn serve(&mut self) -> Result<(), ProtocolError> {
        self.framed
            .send(ResponseMessage::Welcome {
                message: WELCOME.to_string(),
            })
            .await?;

        while let Some(line) = self.framed.next().await {
            let line = line?;

            let message = match serde_json::from_str::<CommandMessage>(&line) {
                Ok(message) => message,
                Err(e) => {
                    tracing::debug!("Undecodable line from {}: {}", self.peer, e);
                    self.framed
                        .send(ResponseMessage::Error {
                            message: format!("Invalid message: {}", e),
                        })
                        .await?;
                    continue;
                }
            };

            if message.is_disconnect() {
                tracing::debug!("Disconnect requested by {}", self.peer);
                self.framed
                    .send(ResponseMessage::Response {
                        command: message.kind,
                        result: ExecutionResult::ok().field("message", "Disconnecting"),
                    })
                    .await?;
                break;
            }

            tracing::debug!("Dispatching {} for {}", message.kind, self.peer);
            let result = self.state.executor.execute(&message).await;
            self.framed
                .send(ResponseMessage::Response {
                    command: message.kind,
                    result,
                })
                .await?;
        }

        Ok(())
    }
}
