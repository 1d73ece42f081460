//! Client commands
//!
//! Every inbound message carries a `type` discriminator; unknown or
//! malformed messages are logged and dropped by the caller.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A command sent by a connected client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientCommand {
    /// Add a channel to the client's subscription set
    Subscribe { channel: String },

    /// Remove a channel from the client's subscription set
    Unsubscribe { channel: String },

    /// Join a room (implicitly leaves the previous one)
    JoinRoom { room_id: String, role: String },

    /// Leave a room
    LeaveRoom { room_id: String },

    /// Refresh activity timestamps without changing membership
    PresencePing,

    /// Act on a cue message in the client's current room
    CueAction { message_id: String, action: String },

    /// Explicit pass-through broadcast
    State { channel: String, data: Value },

    /// Acknowledge a liveness probe
    Ack,
}

impl ClientCommand {
    /// Deserialize from a JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize to a JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
