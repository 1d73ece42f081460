//! Hub-to-client message format
//!
//! Deliveries are either the plain `{channel, data}` broadcast envelope or a
//! `type`-tagged room/liveness event.

use crate::rooms::{PresenceEntry, ReplaySnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message delivered to a connected client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    /// Tagged room-scoped or liveness event
    Typed(TypedEvent),
    /// Ordinary channel broadcast
    Broadcast(BroadcastEnvelope),
}

/// Plain broadcast envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastEnvelope {
    pub channel: String,
    pub data: Value,
}

/// Tagged events for room membership, replay, and liveness probes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum TypedEvent {
    /// Liveness probe; clients answer with `{"type":"ack"}`
    Ping,

    /// Updated presence list for a room
    Presence {
        room_id: String,
        presence: Vec<PresenceEntry>,
        timestamp: DateTime<Utc>,
    },

    /// Private backlog delivered to a client right after joining a room
    Replay {
        room_id: String,
        messages: Vec<Value>,
        pinned_messages: Vec<Value>,
        presence: Vec<PresenceEntry>,
        timestamp: DateTime<Utc>,
    },
}

impl ServerMessage {
    /// Create an ordinary channel broadcast
    #[must_use]
    pub fn broadcast(channel: impl Into<String>, data: Value) -> Self {
        Self::Broadcast(BroadcastEnvelope {
            channel: channel.into(),
            data,
        })
    }

    /// Create a liveness probe
    #[must_use]
    pub fn ping() -> Self {
        Self::Typed(TypedEvent::Ping)
    }

    /// Create a presence update for a room
    #[must_use]
    pub fn presence(room_id: impl Into<String>, presence: Vec<PresenceEntry>) -> Self {
        Self::Typed(TypedEvent::Presence {
            room_id: room_id.into(),
            presence,
            timestamp: Utc::now(),
        })
    }

    /// Create a private replay delivery
    #[must_use]
    pub fn replay(
        room_id: impl Into<String>,
        snapshot: ReplaySnapshot,
        presence: Vec<PresenceEntry>,
    ) -> Self {
        Self::Typed(TypedEvent::Replay {
            room_id: room_id.into(),
            messages: snapshot.messages,
            pinned_messages: snapshot.pinned_messages,
            presence,
            timestamp: Utc::now(),
        })
    }

    /// Serialize to a JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from a JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_broadcast_envelope_shape() {
        let msg = ServerMessage::broadcast("poster", json!({"action": "show"}));
        let json = msg.to_json().unwrap();

        assert!(json.contains(r#""channel":"poster""#));
        assert!(json.contains(r#""action":"show""#));
        // Plain broadcasts carry no type tag
        assert!(!json.contains(r#""type""#));
    }

    #[test]
    fn test_ping_shape() {
        let json = ServerMessage::ping().to_json().unwrap();
        assert_eq!(json, r#"{"type":"ping"}"#);
    }

    #[test]
    fn test_presence_shape() {
        let msg = ServerMessage::presence("main", vec![]);
        let json = msg.to_json().unwrap();

        assert!(json.contains(r#""type":"presence""#));
        assert!(json.contains(r#""roomId":"main""#));
        assert!(json.contains(r#""timestamp""#));
    }

    #[test]
    fn test_replay_shape() {
        let snapshot = ReplaySnapshot {
            messages: vec![json!({"id": "m1"})],
            pinned_messages: vec![json!({"id": "p1"})],
        };
        let msg = ServerMessage::replay("main", snapshot, vec![]);
        let json = msg.to_json().unwrap();

        assert!(json.contains(r#""type":"replay""#));
        assert!(json.contains(r#""pinnedMessages""#));
        assert!(json.contains(r#""presence""#));
    }

    #[test]
    fn test_untagged_roundtrip() {
        let broadcast = ServerMessage::broadcast("overlay", json!({"visible": true}));
        let parsed = ServerMessage::from_json(&broadcast.to_json().unwrap()).unwrap();
        assert_eq!(parsed, broadcast);

        let ping = ServerMessage::ping();
        let parsed = ServerMessage::from_json(&ping.to_json().unwrap()).unwrap();
        assert_eq!(parsed, ping);
    }
}
