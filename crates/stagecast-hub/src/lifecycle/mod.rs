//! Resilient connection lifecycle for external-socket adapters

mod error;
mod manager;

pub use error::{ConnectError, ErrorKind, LastError};
pub use manager::{
    BackoffPolicy, ConnectionAdapter, ConnectionLifecycleManager, ConnectionState, StatusEvent,
};
