//! Wire protocol
//!
//! JSON message formats exchanged between clients and the hub.

mod commands;
mod events;

pub use commands::ClientCommand;
pub use events::{BroadcastEnvelope, ServerMessage, TypedEvent};
