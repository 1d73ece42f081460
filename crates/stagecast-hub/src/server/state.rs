//! Hub server state
//!
//! Shared application state for the WebSocket server.

use crate::heartbeat::HeartbeatMonitor;
use crate::hub::Hub;
use stagecast_common::HubConfig;
use std::sync::Arc;

/// Shared server state
#[derive(Clone)]
pub struct HubState {
    hub: Arc<Hub>,
    heartbeat: Arc<HeartbeatMonitor>,
    config: Arc<HubConfig>,
}

impl HubState {
    /// Create a new server state
    pub fn new(hub: Arc<Hub>, heartbeat: Arc<HeartbeatMonitor>, config: HubConfig) -> Self {
        Self {
            hub,
            heartbeat,
            config: Arc::new(config),
        }
    }

    /// Get the hub
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Get the heartbeat monitor
    pub fn heartbeat(&self) -> &Arc<HeartbeatMonitor> {
        &self.heartbeat
    }

    /// Get the configuration
    pub fn config(&self) -> &HubConfig {
        &self.config
    }
}

impl std::fmt::Debug for HubState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubState")
            .field("hub", &self.hub)
            .finish()
    }
}
