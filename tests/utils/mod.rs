pub mod mocks;

pub use mocks::*;

use std::sync::Arc;

use banter::{AppState, InMemoryRoomRegistry};

/// Fresh state with its registry handle kept around for assertions.
pub fn test_state() -> (AppState, Arc<InMemoryRoomRegistry>) {
    let registry = Arc::new(InMemoryRoomRegistry::new());
    (AppState::new(registry.clone()), registry)
}
