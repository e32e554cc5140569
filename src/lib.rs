// Library crate for the banter chat relay
// This file exposes the public API for integration tests

pub mod registry;
pub mod shared;
pub mod websockets;

// Re-export commonly used types for easier access in tests
pub use registry::{InMemoryRoomRegistry, JoinOutcome, RoomKey, RoomRegistry, StoredMessage};
pub use shared::{AppError, AppState};
pub use websockets::{handle_connection, websocket_handler, ServerEvent, SocketError, SocketWrapper};
