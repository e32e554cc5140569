use async_trait::async_trait;
use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::registry::{JoinOutcome, OutboundSender, RoomKey, RoomRegistry, StoredMessage};
use crate::shared::{AppError, AppState};

use super::messages::{ClientRequest, ServerEvent};
use super::socket::{Connection, MessageHandler, SocketError, SocketWrapper};

/// Message handler for one relaying member
///
/// Holds the identity bound at join time; the client-supplied `userId` on
/// talk requests is never trusted.
struct RelayHandler {
    registry: Arc<dyn RoomRegistry + Send + Sync>,
    key: RoomKey,
    member_id: u64,
    /// This member's own channel, for error events nobody else should see
    outbound: OutboundSender,
}

#[async_trait]
impl MessageHandler for RelayHandler {
    async fn handle_message(&self, message: String) -> Result<(), AppError> {
        let request = serde_json::from_str::<ClientRequest>(&message)
            .map_err(|e| AppError::ProtocolViolation(e.to_string()))?;

        let (payload, claimed_id) = match request {
            ClientRequest::Talk { payload, user_id } => (payload, user_id),
            other => {
                debug!(request = ?other, "Ignoring non-talk request during relay");
                return Ok(());
            }
        };

        if claimed_id != self.member_id {
            debug!(
                claimed = claimed_id,
                bound = self.member_id,
                "Ignoring client-supplied userId"
            );
        }

        match self
            .registry
            .append_message(&self.key, self.member_id, payload)
            .await
        {
            Ok(stored) => {
                // The sender is not excluded: everyone in the room hears the
                // message, its author included.
                self.registry
                    .broadcast(&self.key, &ServerEvent::talk(&stored).to_json(), None)
                    .await;
            }
            Err(e) => {
                // Private to the sender; the relay loop and the room's other
                // members are unaffected.
                let _ = self.outbound.send(ServerEvent::error(e.to_string()).to_json());
            }
        }

        Ok(())
    }
}

/// WebSocket endpoint
///
/// GET / - upgrades to a WebSocket carrying JSON protocol events. Whether
/// the connection creates or joins a room is decided by its init request,
/// not by routing.
pub async fn websocket_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_connection(Box::new(socket), state))
}

/// Drive one connection through init, create/join dispatch, relay, cleanup
///
/// Exposed (behind the socket trait) so the integration tests can run the
/// full state machine against scripted sockets.
pub async fn handle_connection(mut socket: Box<dyn SocketWrapper>, state: AppState) {
    let connection_id = Uuid::new_v4();

    // AWAITING_INIT: read exactly one request, which must be a well-formed
    // init. Anything else is a protocol violation and closes the connection
    // without an error event.
    let first = match socket.receive_message().await {
        Ok(Some(text)) => text,
        Ok(None) => {
            debug!(%connection_id, "Connection closed before init");
            return;
        }
        Err(e) => {
            warn!(%connection_id, error = ?e, "Transport error before init");
            return;
        }
    };

    let join_key = match serde_json::from_str::<ClientRequest>(&first) {
        Ok(ClientRequest::Init { join_key }) => join_key,
        Ok(other) => {
            warn!(%connection_id, request = ?other, "First request was not init, closing");
            return;
        }
        Err(e) => {
            warn!(%connection_id, error = %e, "Malformed init request, closing");
            return;
        }
    };

    match join_key {
        None => create_room(socket, state, connection_id).await,
        Some(raw_key) => {
            join_room(socket, state, connection_id, RoomKey::from(raw_key.as_str())).await
        }
    }
}

/// CREATING: first participant starts a new room
async fn create_room(mut socket: Box<dyn SocketWrapper>, state: AppState, connection_id: Uuid) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (key, member_id) = state.registry.create(tx.clone()).await;

    info!(%connection_id, key = %key, "Connection started a room");

    let ack = ServerEvent::init_ack(key.as_str(), member_id).to_json();
    let relay_result = match socket.send_message(ack).await {
        Ok(()) => relay(socket, &state, &key, member_id, tx, rx).await,
        Err(e) => Err(e),
    };

    // Room lifetime is bound to the creator's connection. This is the only
    // destroy site, and it runs no matter how the relay ended - even with
    // other members still connected.
    state.registry.destroy(&key).await;
    log_connection_end(connection_id, relay_result);
}

/// JOINING: a participant enters an existing room by key
async fn join_room(
    mut socket: Box<dyn SocketWrapper>,
    state: AppState,
    connection_id: Uuid,
    key: RoomKey,
) {
    let (tx, rx) = mpsc::unbounded_channel();

    let (member_id, history) = match state.registry.join(&key, tx.clone()).await {
        JoinOutcome::Joined { member_id, history } => (member_id, history),
        JoinOutcome::NotFound => {
            info!(%connection_id, key = %key, "Join attempt with unknown key");
            let error = ServerEvent::error(AppError::RoomNotFound.to_string()).to_json();
            let _ = socket.send_message(error).await;
            let _ = socket.close().await;
            return;
        }
    };

    info!(%connection_id, key = %key, member_id, "Connection joined a room");

    let relay_result = match replay(socket.as_mut(), &key, member_id, &history).await {
        Ok(()) => relay(socket, &state, &key, member_id, tx, rx).await,
        Err(e) => Err(e),
    };

    // The room survives a joiner's departure; only its membership shrinks.
    state.registry.remove_member(&key, member_id).await;
    log_connection_end(connection_id, relay_result);
}

/// Send the init acknowledgement followed by the history snapshot, in
/// stored order. Messages appended after the snapshot arrive through the
/// outbound channel once the relay loop starts, so each reaches the joiner
/// exactly once.
async fn replay(
    socket: &mut dyn SocketWrapper,
    key: &RoomKey,
    member_id: u64,
    history: &[StoredMessage],
) -> Result<(), SocketError> {
    socket
        .send_message(ServerEvent::init_ack(key.as_str(), member_id).to_json())
        .await?;

    for message in history {
        socket
            .send_message(ServerEvent::talk(message).to_json())
            .await?;
    }

    Ok(())
}

/// RELAYING: run the select loop until the connection ends
async fn relay(
    socket: Box<dyn SocketWrapper>,
    state: &AppState,
    key: &RoomKey,
    member_id: u64,
    outbound: OutboundSender,
    outbound_receiver: mpsc::UnboundedReceiver<String>,
) -> Result<(), SocketError> {
    let handler = Arc::new(RelayHandler {
        registry: state.registry.clone(),
        key: key.clone(),
        member_id,
        outbound,
    });

    Connection::new(socket, outbound_receiver, handler).run().await
}

fn log_connection_end(connection_id: Uuid, result: Result<(), SocketError>) {
    match result {
        Ok(()) => info!(%connection_id, "Connection closed cleanly"),
        Err(e) => warn!(%connection_id, error = ?e, "Connection closed with transport error"),
    }
}
