//! Hub configuration structs
//!
//! Loads configuration from environment variables.

use serde::Deserialize;
use std::env;

/// Main hub configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    /// Heartbeat sweep interval in milliseconds
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Outbound message buffer per client
    #[serde(default = "default_client_buffer")]
    pub client_buffer: usize,
    /// Number of recent messages kept per room for replay
    #[serde(default = "default_replay_backlog")]
    pub replay_backlog: usize,
    #[serde(default)]
    pub bind_conflict: BindConflictMode,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Behavior when the listen endpoint is already owned by another process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BindConflictMode {
    /// Treat the conflict as a hard startup error
    #[default]
    Fail,
    /// Log and stay inert; another instance already serves the endpoint
    Passive,
}

/// Reconnect policy for external-socket adapters
#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleConfig {
    /// Base reconnect delay in milliseconds
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Maximum automatic reconnect attempts before requiring a manual connect
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_attempts: u32,
    /// Optional ceiling on the computed backoff delay, in milliseconds
    #[serde(default)]
    pub max_delay_ms: Option<u64>,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_reconnect_base_delay_ms(),
            max_attempts: default_max_reconnect_attempts(),
            max_delay_ms: None,
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "stagecast-hub".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_client_buffer() -> usize {
    100
}

fn default_replay_backlog() -> usize {
    50
}

fn default_reconnect_base_delay_ms() -> u64 {
    3_000
}

fn default_max_reconnect_attempts() -> u32 {
    8
}

impl HubConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let port = match env::var("HUB_PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidValue("HUB_PORT", raw.clone()))?,
            Err(_) => return Err(ConfigError::MissingVar("HUB_PORT")),
        };

        Ok(Self {
            name: env::var("APP_NAME").unwrap_or_else(|_| default_app_name()),
            env: env::var("APP_ENV")
                .ok()
                .and_then(|s| match s.to_lowercase().as_str() {
                    "production" => Some(Environment::Production),
                    "staging" => Some(Environment::Staging),
                    "development" => Some(Environment::Development),
                    _ => None,
                })
                .unwrap_or_default(),
            host: env::var("HUB_HOST").unwrap_or_else(|_| default_host()),
            port,
            heartbeat_interval_ms: env::var("HEARTBEAT_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_heartbeat_interval_ms),
            client_buffer: env::var("CLIENT_BUFFER")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_client_buffer),
            replay_backlog: env::var("REPLAY_BACKLOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_replay_backlog),
            bind_conflict: env::var("BIND_CONFLICT_MODE")
                .ok()
                .and_then(|s| match s.to_lowercase().as_str() {
                    "passive" => Some(BindConflictMode::Passive),
                    "fail" => Some(BindConflictMode::Fail),
                    _ => None,
                })
                .unwrap_or_default(),
            lifecycle: LifecycleConfig {
                base_delay_ms: env::var("RECONNECT_BASE_DELAY_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_reconnect_base_delay_ms),
                max_attempts: env::var("RECONNECT_MAX_ATTEMPTS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_max_reconnect_attempts),
                max_delay_ms: env::var("RECONNECT_MAX_DELAY_MS")
                    .ok()
                    .and_then(|s| s.parse().ok()),
            },
        })
    }

    /// Listen address string
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
