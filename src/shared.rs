use std::sync::Arc;
use thiserror::Error;

use crate::registry::RoomRegistry;

/// Shared application state containing all dependencies
///
/// The registry is injected here rather than living in a module-level
/// global, so its lifetime is explicit and tests can build their own.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<dyn RoomRegistry + Send + Sync>,
}

impl AppState {
    pub fn new(registry: Arc<dyn RoomRegistry + Send + Sync>) -> Self {
        Self { registry }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed or out-of-sequence client input. Fatal to the connection;
    /// no error event is sent.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The key names no live room. Wire message is fixed by the protocol.
    #[error("chat not found")]
    RoomNotFound,

    /// The room's configured history capacity is exhausted. Reported only
    /// to the sender; the room keeps relaying for everyone else.
    #[error("message history is full")]
    HistoryFull,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_match_wire_contract() {
        assert_eq!(AppError::RoomNotFound.to_string(), "chat not found");
        assert_eq!(
            AppError::ProtocolViolation("bad init".to_string()).to_string(),
            "protocol violation: bad init"
        );
    }
}
