use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};

use banter::{handle_connection, AppState, ServerEvent, SocketError, SocketWrapper};

// ============================================================================
// Mock Infrastructure
// ============================================================================

/// Scripted socket: frames pushed into `incoming` become the connection's
/// inbound stream; everything the server sends is captured in `sent`.
pub struct MockSocket {
    incoming: mpsc::UnboundedReceiver<String>,
    sent: Arc<RwLock<Vec<String>>>,
}

#[async_trait]
impl SocketWrapper for MockSocket {
    async fn send_message(&mut self, message: String) -> Result<(), SocketError> {
        self.sent.write().await.push(message);
        Ok(())
    }

    async fn receive_message(&mut self) -> Result<Option<String>, SocketError> {
        Ok(self.incoming.recv().await)
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        Ok(())
    }
}

/// One simulated participant: a mock socket plus the connection task
/// driving the real state machine over it.
pub struct TestClient {
    to_server: Option<mpsc::UnboundedSender<String>>,
    sent: Arc<RwLock<Vec<String>>>,
    task: JoinHandle<()>,
}

impl TestClient {
    pub fn connect(state: &AppState) -> Self {
        let (to_server, incoming) = mpsc::unbounded_channel();
        let sent = Arc::new(RwLock::new(Vec::new()));
        let socket = MockSocket {
            incoming,
            sent: sent.clone(),
        };
        let task = tokio::spawn(handle_connection(Box::new(socket), state.clone()));

        Self {
            to_server: Some(to_server),
            sent,
            task,
        }
    }

    pub fn send_raw(&self, frame: &str) {
        self.to_server
            .as_ref()
            .expect("client already disconnected")
            .send(frame.to_string())
            .expect("server dropped the inbound channel");
    }

    pub fn send_init(&self) {
        self.send_raw(r#"{"type": "init"}"#);
    }

    pub fn send_join(&self, key: &str) {
        self.send_raw(&format!(r#"{{"type": "init", "joinKey": "{}"}}"#, key));
    }

    pub fn send_talk(&self, payload: &str, user_id: u64) {
        self.send_raw(&format!(
            r#"{{"type": "talk", "payload": "{}", "userId": {}}}"#,
            payload, user_id
        ));
    }

    /// Everything the server has sent so far, parsed.
    pub async fn events(&self) -> Vec<ServerEvent> {
        self.sent
            .read()
            .await
            .iter()
            .map(|raw| serde_json::from_str(raw).expect("server sent a malformed event"))
            .collect()
    }

    /// Polls until at least `count` events have arrived.
    pub async fn wait_for_events(&self, count: usize) -> Vec<ServerEvent> {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let events = self.events().await;
            if events.len() >= count {
                return events;
            }
            if Instant::now() >= deadline {
                panic!(
                    "timed out waiting for {} events, have {}: {:?}",
                    count,
                    events.len(),
                    events
                );
            }
            sleep(Duration::from_millis(10)).await;
        }
    }

    /// Lets in-flight deliveries settle, then asserts nothing beyond
    /// `count` events ever arrived.
    pub async fn assert_settles_at(&self, count: usize) {
        sleep(Duration::from_millis(50)).await;
        let events = self.events().await;
        assert_eq!(
            events.len(),
            count,
            "expected exactly {} events, got {:?}",
            count,
            events
        );
    }

    /// Closes the client side and waits until the server task - including
    /// its cleanup - has finished.
    pub async fn disconnect(mut self) {
        self.to_server = None;
        timeout(Duration::from_secs(1), &mut self.task)
            .await
            .expect("server task did not finish after disconnect")
            .expect("server task panicked");
    }

    /// Asserts the server terminated the connection on its own (the client
    /// side is still open).
    pub async fn expect_server_closed(mut self) {
        timeout(Duration::from_secs(1), &mut self.task)
            .await
            .expect("server did not close the connection")
            .expect("server task panicked");
    }
}

/// Pulls the join key out of a client's init acknowledgement.
pub fn join_key_from(events: &[ServerEvent]) -> String {
    match events.first() {
        Some(ServerEvent::InitAck { join_key, .. }) => join_key.clone(),
        other => panic!("expected an init-ack first, got {:?}", other),
    }
}
