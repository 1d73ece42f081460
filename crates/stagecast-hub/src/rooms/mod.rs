//! Room membership, presence, and replay

mod presence;
mod replay;

pub use presence::{PresenceEntry, RoomPresenceTracker};
pub use replay::{InMemoryReplayProvider, ReplayCoordinator, ReplayProvider, ReplaySnapshot};

/// Broadcast channel carrying a room's events
#[must_use]
pub fn room_channel(room_id: &str) -> String {
    format!("room:{room_id}")
}
