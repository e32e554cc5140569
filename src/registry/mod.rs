// Public API - what other modules can use
pub use key::RoomKey;
pub use repository::{InMemoryRoomRegistry, JoinOutcome, RoomRegistry};
pub use room::{OutboundSender, Room, StoredMessage};

// Internal modules
mod key;
mod repository;
mod room;
