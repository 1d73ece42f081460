//! Configuration structs

mod hub_config;

pub use hub_config::{BindConflictMode, ConfigError, Environment, HubConfig, LifecycleConfig};
