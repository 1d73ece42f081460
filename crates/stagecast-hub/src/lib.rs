//! # stagecast-hub
//!
//! Real-time distribution hub for the production control panel: fans state
//! changes out to connected dashboards and keeps external-socket adapters
//! attached through a resilient reconnect lifecycle.

pub mod broadcast;
pub mod handlers;
pub mod heartbeat;
pub mod hub;
pub mod lifecycle;
pub mod protocol;
pub mod registry;
pub mod rooms;
pub mod server;

pub use hub::Hub;
