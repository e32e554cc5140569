use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::shared::AppError;

/// Outbound channel handle for one connected member.
///
/// The receiving half lives in that member's connection task; sending never
/// blocks, so a slow peer cannot stall whoever is broadcasting.
pub type OutboundSender = mpsc::UnboundedSender<String>;

/// A single chat message as stored in a room's history.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
    pub payload: String,
    pub sender_id: u64,
    /// Server-assigned ingestion time. Clients never supply this.
    pub time: DateTime<Utc>,
}

struct Member {
    id: u64,
    sender: OutboundSender,
}

/// One chat: ordered message history plus the live broadcast membership.
///
/// Member ids come from a monotonic counter that starts at 1 (the creator)
/// and is never reused within the room's lifetime, so ids stay unique even
/// when membership churns.
pub struct Room {
    messages: Vec<StoredMessage>,
    members: Vec<Member>,
    next_member_id: u64,
    max_messages: Option<usize>,
}

impl Room {
    /// Creates an empty room with unbounded history.
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            members: Vec::new(),
            next_member_id: 1,
            max_messages: None,
        }
    }

    /// Creates an empty room that refuses appends past `max_messages`.
    pub fn with_capacity(max_messages: usize) -> Self {
        Self {
            max_messages: Some(max_messages),
            ..Self::new()
        }
    }

    /// Registers a member for live broadcasts and returns its id.
    pub fn add_member(&mut self, sender: OutboundSender) -> u64 {
        let id = self.next_member_id;
        self.next_member_id += 1;
        self.members.push(Member { id, sender });
        id
    }

    /// Drops a member from the broadcast set. Unknown ids are a no-op so
    /// cleanup paths can call this unconditionally.
    pub fn remove_member(&mut self, member_id: u64) {
        self.members.retain(|m| m.id != member_id);
    }

    /// Appends a message with a server-assigned timestamp and returns the
    /// stored copy.
    pub fn append_message(
        &mut self,
        payload: String,
        sender_id: u64,
    ) -> Result<StoredMessage, AppError> {
        if let Some(max) = self.max_messages {
            if self.messages.len() >= max {
                return Err(AppError::HistoryFull);
            }
        }

        let message = StoredMessage {
            payload,
            sender_id,
            time: Utc::now(),
        };
        self.messages.push(message.clone());
        Ok(message)
    }

    /// Returns a stable copy of the history as of the call, in append order.
    pub fn snapshot_history(&self) -> Vec<StoredMessage> {
        self.messages.clone()
    }

    /// Clones every member's outbound handle for a broadcast pass.
    pub fn member_senders(&self) -> Vec<(u64, OutboundSender)> {
        self.members
            .iter()
            .map(|m| (m.id, m.sender.clone()))
            .collect()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

impl Default for Room {
    fn default() -> Self {
        Self::new()
    }
}
