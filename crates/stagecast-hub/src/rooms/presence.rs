//! Room presence tracking
//!
//! One presence entry per (room, client) pair; entries exist only while the
//! client is an online member of the room.

use crate::registry::ClientId;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Presence state of one client inside one room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEntry {
    pub room_id: String,
    pub client_id: ClientId,
    pub role: String,
    pub is_online: bool,
    pub last_seen: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl PresenceEntry {
    fn new(room_id: &str, client_id: ClientId, role: &str) -> Self {
        let now = Utc::now();
        Self {
            room_id: room_id.to_string(),
            client_id,
            role: role.to_string(),
            is_online: true,
            last_seen: now,
            last_activity: now,
        }
    }
}

/// Tracks membership and activity of clients inside rooms
pub struct RoomPresenceTracker {
    rooms: DashMap<String, HashMap<ClientId, PresenceEntry>>,
}

impl RoomPresenceTracker {
    /// Create a new tracker
    #[must_use]
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    /// Create or replace the presence entry for a (room, client) pair
    pub fn insert(&self, room_id: &str, client_id: ClientId, role: &str) {
        self.rooms
            .entry(room_id.to_string())
            .or_default()
            .insert(client_id, PresenceEntry::new(room_id, client_id, role));

        tracing::debug!(room_id = %room_id, client_id = %client_id, role = %role, "Presence entry created");
    }

    /// Remove a presence entry; empty rooms are dropped
    pub fn remove(&self, room_id: &str, client_id: ClientId) -> bool {
        let mut removed = false;
        self.rooms.alter(room_id, |_, mut members| {
            removed = members.remove(&client_id).is_some();
            members
        });
        self.rooms.retain(|_, members| !members.is_empty());

        if removed {
            tracing::debug!(room_id = %room_id, client_id = %client_id, "Presence entry removed");
        }

        removed
    }

    /// Refresh activity timestamps without altering membership
    pub fn touch(&self, room_id: &str, client_id: ClientId) -> bool {
        let mut touched = false;
        self.rooms.alter(room_id, |_, mut members| {
            if let Some(entry) = members.get_mut(&client_id) {
                let now = Utc::now();
                entry.last_seen = now;
                entry.last_activity = now;
                touched = true;
            }
            members
        });
        touched
    }

    /// Get an immutable snapshot of a room's presence list
    pub fn snapshot(&self, room_id: &str) -> Vec<PresenceEntry> {
        self.rooms
            .get(room_id)
            .map(|members| members.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Check if a client is a member of a room
    pub fn is_member(&self, room_id: &str, client_id: ClientId) -> bool {
        self.rooms
            .get(room_id)
            .is_some_and(|members| members.contains_key(&client_id))
    }

    /// Get the ids of all rooms with online members
    pub fn room_ids(&self) -> Vec<String> {
        self.rooms.iter().map(|r| r.key().clone()).collect()
    }

    /// Get the number of rooms with online members
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

impl Default for RoomPresenceTracker {
    fn default() -> Self {
        Self::new()
    }
}
