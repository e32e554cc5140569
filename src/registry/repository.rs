use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::key::RoomKey;
use super::room::{OutboundSender, Room, StoredMessage};
use crate::shared::AppError;

/// Result of attempting to join a room by key
#[derive(Debug)]
pub enum JoinOutcome {
    /// Successfully joined; carries the assigned member id and a history
    /// snapshot taken atomically with the membership change, so replay and
    /// live broadcast never overlap for this member.
    Joined {
        member_id: u64,
        history: Vec<StoredMessage>,
    },
    /// No room exists under that key
    NotFound,
}

/// Trait for room registry operations
///
/// The registry is the only process-wide mutable state: a mapping from
/// secret room key to the room behind it. It is injected into the connection
/// handler as a trait object so tests can substitute their own.
#[async_trait]
pub trait RoomRegistry: Send + Sync {
    /// Creates a room with the caller already registered as member 1 and
    /// returns the fresh key alongside that member id.
    async fn create(&self, sender: OutboundSender) -> (RoomKey, u64);

    /// Atomically registers a member and snapshots history for replay.
    async fn join(&self, key: &RoomKey, sender: OutboundSender) -> JoinOutcome;

    /// Appends a message to a room's history with a server timestamp.
    async fn append_message(
        &self,
        key: &RoomKey,
        sender_id: u64,
        payload: String,
    ) -> Result<StoredMessage, AppError>;

    /// Delivers `text` to every current member's outbound channel except an
    /// optionally excluded member. Talk broadcasts exclude nobody - the
    /// sender hears its own messages. Delivery is fire-and-forget per
    /// member: a dead channel is skipped and never aborts delivery to the
    /// rest.
    async fn broadcast(&self, key: &RoomKey, text: &str, exclude: Option<u64>);

    /// Drops one member; the room survives. Safe if the member or the room
    /// is already gone.
    async fn remove_member(&self, key: &RoomKey, member_id: u64);

    /// Removes the room entirely. Called exactly once, when the creating
    /// connection closes.
    async fn destroy(&self, key: &RoomKey);

    /// Number of live rooms.
    async fn room_count(&self) -> usize;
}

/// In-memory implementation of RoomRegistry
///
/// One mutex guards the whole map, so every operation is a single lock
/// acquisition and lookups never observe a partially-inserted room.
pub struct InMemoryRoomRegistry {
    rooms: Mutex<HashMap<RoomKey, Room>>,
    room_capacity: Option<usize>,
}

impl Default for InMemoryRoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRoomRegistry {
    /// Creates a new empty registry whose rooms keep unbounded history
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            room_capacity: None,
        }
    }

    /// Creates a registry whose rooms cap their history at `max_messages`
    pub fn with_room_capacity(max_messages: usize) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            room_capacity: Some(max_messages),
        }
    }

    fn new_room(&self) -> Room {
        match self.room_capacity {
            Some(max) => Room::with_capacity(max),
            None => Room::new(),
        }
    }
}

#[async_trait]
impl RoomRegistry for InMemoryRoomRegistry {
    #[instrument(skip(self, sender))]
    async fn create(&self, sender: OutboundSender) -> (RoomKey, u64) {
        let mut rooms = self.rooms.lock().unwrap();

        // Keys carry 130+ bits of entropy; regenerate on the collision that
        // should never happen rather than overwrite a live room.
        let key = loop {
            let candidate = RoomKey::generate();
            if !rooms.contains_key(&candidate) {
                break candidate;
            }
            warn!("room key collision, regenerating");
        };

        let mut room = self.new_room();
        let member_id = room.add_member(sender);
        rooms.insert(key.clone(), room);

        info!(key = %key, room_count = rooms.len(), "Room created");
        (key, member_id)
    }

    #[instrument(skip(self, sender))]
    async fn join(&self, key: &RoomKey, sender: OutboundSender) -> JoinOutcome {
        let mut rooms = self.rooms.lock().unwrap();

        let room = match rooms.get_mut(key) {
            Some(room) => room,
            None => {
                debug!(key = %key, "Join attempt for unknown key");
                return JoinOutcome::NotFound;
            }
        };

        let member_id = room.add_member(sender);
        let history = room.snapshot_history();

        info!(
            key = %key,
            member_id,
            member_count = room.member_count(),
            replay_len = history.len(),
            "Member joined room"
        );

        JoinOutcome::Joined { member_id, history }
    }

    #[instrument(skip(self, payload))]
    async fn append_message(
        &self,
        key: &RoomKey,
        sender_id: u64,
        payload: String,
    ) -> Result<StoredMessage, AppError> {
        let mut rooms = self.rooms.lock().unwrap();

        let room = rooms.get_mut(key).ok_or(AppError::RoomNotFound)?;
        let message = room.append_message(payload, sender_id)?;

        debug!(key = %key, sender_id, "Message appended to history");
        Ok(message)
    }

    #[instrument(skip(self, text))]
    async fn broadcast(&self, key: &RoomKey, text: &str, exclude: Option<u64>) {
        let senders = {
            let rooms = self.rooms.lock().unwrap();
            match rooms.get(key) {
                Some(room) => room.member_senders(),
                None => {
                    debug!(key = %key, "Broadcast to missing room dropped");
                    return;
                }
            }
        };

        for (member_id, sender) in senders {
            if exclude == Some(member_id) {
                continue;
            }
            // A failed send means that member's connection task is gone; the
            // transport's own disconnect handling removes it from the room.
            if sender.send(text.to_string()).is_err() {
                warn!(key = %key, member_id, "Dropping broadcast to dead member channel");
            }
        }
    }

    #[instrument(skip(self))]
    async fn remove_member(&self, key: &RoomKey, member_id: u64) {
        let mut rooms = self.rooms.lock().unwrap();

        if let Some(room) = rooms.get_mut(key) {
            room.remove_member(member_id);
            info!(
                key = %key,
                member_id,
                member_count = room.member_count(),
                "Member left room"
            );
        } else {
            debug!(key = %key, member_id, "Member removal for missing room ignored");
        }
    }

    #[instrument(skip(self))]
    async fn destroy(&self, key: &RoomKey) {
        let mut rooms = self.rooms.lock().unwrap();

        match rooms.remove(key) {
            Some(room) => info!(
                key = %key,
                remaining_members = room.member_count(),
                room_count = rooms.len(),
                "Room destroyed"
            ),
            None => debug!(key = %key, "Destroy for missing room ignored"),
        }
    }

    async fn room_count(&self) -> usize {
        self.rooms.lock().unwrap().len()
    }
}
