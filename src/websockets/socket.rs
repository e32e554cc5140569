use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

use crate::shared::AppError;

/// Simple WebSocket abstraction - all we care about is send/receive
#[async_trait]
pub trait SocketWrapper: Send {
    /// Send a text frame to the client
    async fn send_message(&mut self, message: String) -> Result<(), SocketError>;

    /// Receive the next text frame from the client (None if connection closed)
    async fn receive_message(&mut self) -> Result<Option<String>, SocketError>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), SocketError>;
}

/// Handler for inbound frames while a connection is relaying
///
/// Returning an error terminates the connection; recoverable conditions are
/// handled inside the implementation and reported on the member's own
/// outbound channel instead.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle_message(&self, message: String) -> Result<(), AppError>;
}

#[derive(Debug)]
pub enum SocketError {
    SendFailed(String),
    ReceiveFailed(String),
}

/// Direct implementation on axum's WebSocket
#[async_trait]
impl SocketWrapper for WebSocket {
    async fn send_message(&mut self, message: String) -> Result<(), SocketError> {
        self.send(Message::Text(message))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }

    async fn receive_message(&mut self) -> Result<Option<String>, SocketError> {
        // Skip ping/pong/binary frames; only text carries protocol events.
        loop {
            match self.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Close(_))) => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(SocketError::ReceiveFailed(e.to_string())),
                None => return Ok(None),
            }
        }
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        self.send(Message::Close(None))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }
}

/// Connection drives one member's relay loop
///
/// Outbound frames arrive on a channel fed by room broadcasts (and private
/// error events); inbound frames go to the message handler. The loop ends
/// when the peer disconnects, the transport fails, or the handler reports a
/// protocol violation - the caller performs cleanup in every case.
pub struct Connection {
    socket: Box<dyn SocketWrapper>,
    outbound_receiver: mpsc::UnboundedReceiver<String>,
    message_handler: Arc<dyn MessageHandler>,
}

impl Connection {
    pub fn new(
        socket: Box<dyn SocketWrapper>,
        outbound_receiver: mpsc::UnboundedReceiver<String>,
        message_handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self {
            socket,
            outbound_receiver,
            message_handler,
        }
    }

    /// Run the connection - handles both sending and receiving until disconnect
    pub async fn run(mut self) -> Result<(), SocketError> {
        loop {
            tokio::select! {
                // Outbound: room broadcasts and private events to this client
                msg = self.outbound_receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.socket.send_message(message).await?
                        }
                        None => break, // All senders gone, nothing left to relay
                    }
                }

                // Inbound: requests from the client
                msg = self.socket.receive_message() => {
                    match msg {
                        Ok(Some(message)) => {
                            if let Err(e) = self.message_handler.handle_message(message).await {
                                warn!(error = %e, "Terminating connection on fatal request error");
                                break;
                            }
                        }
                        Ok(None) => break, // Client disconnected
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        // Clean disconnect
        let _ = self.socket.close().await;
        Ok(())
    }
}
