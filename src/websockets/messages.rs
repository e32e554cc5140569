use serde::{Deserialize, Serialize};

use crate::registry::StoredMessage;

/// Requests a client may send, tagged by the wire `type` field
///
/// Request types the relay does not act on still need to parse, so they can
/// be ignored rather than treated as protocol violations; `Unsupported`
/// absorbs them.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ClientRequest {
    /// First message on every connection. A present `joinKey` means "join
    /// that room"; absence means "start a new one".
    #[serde(rename = "init")]
    Init {
        #[serde(rename = "joinKey")]
        join_key: Option<String>,
    },

    /// A chat message. The `userId` field is part of the wire contract but
    /// the server binds sender identity at join time and ignores it.
    #[serde(rename = "talk")]
    Talk {
        payload: String,
        #[serde(rename = "userId")]
        user_id: u64,
    },

    #[serde(other)]
    Unsupported,
}

/// Events the server emits, tagged by the wire `type` field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Acknowledges a successful create or join, carrying the join key for
    /// building invite links and the member's server-assigned id.
    #[serde(rename = "init")]
    InitAck {
        #[serde(rename = "joinKey")]
        join_key: String,
        #[serde(rename = "userId")]
        user_id: u64,
    },

    /// One chat message, broadcast live or replayed from history.
    #[serde(rename = "talk")]
    Talk {
        payload: String,
        #[serde(rename = "userId")]
        user_id: u64,
        /// Server ingestion time in seconds since the Unix epoch.
        time: f64,
    },

    #[serde(rename = "error")]
    Error { message: String },
}

/// Helper constructors for server events
impl ServerEvent {
    /// Create an init acknowledgement
    pub fn init_ack(join_key: &str, user_id: u64) -> Self {
        Self::InitAck {
            join_key: join_key.to_string(),
            user_id,
        }
    }

    /// Create a talk event from a stored history entry
    pub fn talk(message: &StoredMessage) -> Self {
        Self::Talk {
            payload: message.payload.clone(),
            user_id: message.sender_id,
            time: message.time.timestamp_millis() as f64 / 1000.0,
        }
    }

    /// Create an error event
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Serialize to the wire form. Infallible for these shapes.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap()
    }
}
