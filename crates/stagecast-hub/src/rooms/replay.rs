//! Replay on room join
//!
//! The backlog source is injected at construction; the coordinator fetches a
//! snapshot and the hub delivers it privately to the joining client only.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;

/// Backlog snapshot handed to a joining client
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplaySnapshot {
    /// Recent domain messages, oldest first
    pub messages: Vec<Value>,
    /// Pinned messages, in pin order
    pub pinned_messages: Vec<Value>,
}

/// Supplies the backlog for a room, resolved once at hub construction
#[async_trait]
pub trait ReplayProvider: Send + Sync {
    /// Fetch the recent and pinned messages for a room
    async fn get_replay(&self, room_id: &str) -> ReplaySnapshot;
}

/// Fetches replay snapshots from the injected provider
pub struct ReplayCoordinator {
    provider: Arc<dyn ReplayProvider>,
}

impl ReplayCoordinator {
    /// Create a coordinator over a provider
    pub fn new(provider: Arc<dyn ReplayProvider>) -> Self {
        Self { provider }
    }

    /// Fetch the backlog snapshot for a room
    pub async fn snapshot(&self, room_id: &str) -> ReplaySnapshot {
        self.provider.get_replay(room_id).await
    }
}

#[derive(Debug, Default)]
struct RoomBacklog {
    recent: VecDeque<Value>,
    pinned: Vec<Value>,
}

/// Bounded in-memory backlog, the default host wiring
pub struct InMemoryReplayProvider {
    capacity: usize,
    rooms: DashMap<String, RoomBacklog>,
}

impl InMemoryReplayProvider {
    /// Create a provider keeping at most `capacity` recent messages per room
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            rooms: DashMap::new(),
        }
    }

    /// Record a domain message into a room's backlog
    pub fn record(&self, room_id: &str, message: Value) {
        let mut backlog = self.rooms.entry(room_id.to_string()).or_default();
        backlog.recent.push_back(message);
        while backlog.recent.len() > self.capacity {
            backlog.recent.pop_front();
        }
    }

    /// Pin a message in a room
    pub fn pin(&self, room_id: &str, message: Value) {
        self.rooms
            .entry(room_id.to_string())
            .or_default()
            .pinned
            .push(message);
    }

    /// Clear a room's backlog and pins
    pub fn clear(&self, room_id: &str) {
        self.rooms.remove(room_id);
    }
}

#[async_trait]
impl ReplayProvider for InMemoryReplayProvider {
    async fn get_replay(&self, room_id: &str) -> ReplaySnapshot {
        self.rooms
            .get(room_id)
            .map(|backlog| ReplaySnapshot {
                messages: backlog.recent.iter().cloned().collect(),
                pinned_messages: backlog.pinned.clone(),
            })
            .unwrap_or_default()
    }
}
