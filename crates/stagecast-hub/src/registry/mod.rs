//! Connection registry
//!
//! Tracks every accepted transport connection and its client state.

mod client;
mod registry;

pub use client::{Client, ClientId, RoomMembership};
pub use registry::ConnectionRegistry;
