// Public API
pub use handler::{handle_connection, websocket_handler};
pub use messages::{ClientRequest, ServerEvent};
pub use socket::{Connection, MessageHandler, SocketError, SocketWrapper};

// Internal modules
mod handler;
mod messages;
mod socket;
