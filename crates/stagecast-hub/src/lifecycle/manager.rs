//! Connection lifecycle state machine
//!
//! One manager per external-socket adapter. Failures are never fatal: they
//! are retried with bounded exponential backoff, and every transition is
//! observable through a status stream.

use super::{ConnectError, LastError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use stagecast_common::LifecycleConfig;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;

/// Adapter connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Transport hooks supplied by each adapter
#[async_trait]
pub trait ConnectionAdapter: Send + Sync {
    /// Establish the underlying connection
    ///
    /// No timeout is imposed here; adapters own their own timeout policy
    /// and report it as `ConnectError::Timeout`.
    async fn do_connect(&self) -> Result<(), ConnectError>;

    /// Tear down the underlying connection
    async fn do_disconnect(&self);

    /// Called after a successful connect
    async fn on_connected(&self) {}

    /// Called after a manual disconnect completes
    async fn on_disconnected(&self) {}

    /// Called when a connect attempt or the live connection fails
    async fn on_error(&self, _error: &ConnectError) {}
}

/// Reconnect policy
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Automatic attempts before requiring a manual `connect`
    pub max_attempts: u32,
    /// Optional ceiling on the computed delay
    pub max_delay: Option<Duration>,
}

impl BackoffPolicy {
    /// Build a policy from configuration
    #[must_use]
    pub fn from_config(config: &LifecycleConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_attempts: config.max_attempts,
            max_delay: config.max_delay_ms.map(Duration::from_millis),
        }
    }

    /// Delay before the retry following `attempts` prior attempts
    #[must_use]
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let delay = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempts));
        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&LifecycleConfig::default())
    }
}

/// One observable lifecycle transition
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub adapter: String,
    pub state: ConnectionState,
    pub attempts: u32,
    pub last_error: Option<LastError>,
    pub timestamp: DateTime<Utc>,
}

/// Buffered status events per adapter
const STATUS_BUFFER: usize = 32;

/// Drives an adapter through connect/disconnect with auto-reconnect
pub struct ConnectionLifecycleManager {
    name: String,
    adapter: Arc<dyn ConnectionAdapter>,
    policy: BackoffPolicy,
    state: RwLock<ConnectionState>,
    attempts: AtomicU32,
    last_error: RwLock<Option<LastError>>,
    /// At most one pending reconnect timer at any instant
    reconnect_timer: Mutex<Option<JoinHandle<()>>>,
    /// Suppresses reconnects scheduled by in-flight close events
    manual_disconnect: AtomicBool,
    status_tx: broadcast::Sender<StatusEvent>,
}

impl ConnectionLifecycleManager {
    /// Create a manager for one adapter
    pub fn new(
        name: impl Into<String>,
        adapter: Arc<dyn ConnectionAdapter>,
        policy: BackoffPolicy,
    ) -> Arc<Self> {
        let (status_tx, _) = broadcast::channel(STATUS_BUFFER);
        Arc::new(Self {
            name: name.into(),
            adapter,
            policy,
            state: RwLock::new(ConnectionState::Disconnected),
            attempts: AtomicU32::new(0),
            last_error: RwLock::new(None),
            reconnect_timer: Mutex::new(None),
            manual_disconnect: AtomicBool::new(false),
            status_tx,
        })
    }

    /// Get the adapter name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the current state
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Get the automatic attempt counter
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Get the last recorded connection error
    pub async fn last_error(&self) -> Option<LastError> {
        self.last_error.read().await.clone()
    }

    /// Observe lifecycle transitions
    pub fn subscribe_status(&self) -> broadcast::Receiver<StatusEvent> {
        self.status_tx.subscribe()
    }

    /// Current status as one event, for diagnostics
    pub async fn status_snapshot(&self) -> StatusEvent {
        StatusEvent {
            adapter: self.name.clone(),
            state: self.state().await,
            attempts: self.attempts(),
            last_error: self.last_error().await,
            timestamp: Utc::now(),
        }
    }

    /// Attempt to connect
    ///
    /// No-op when already connected. Entering Connecting cancels any pending
    /// reconnect timer, so a manual connect supersedes the automatic one.
    pub async fn connect(self: &Arc<Self>) {
        if self.state().await == ConnectionState::Connected {
            tracing::debug!(adapter = %self.name, "Already connected");
            return;
        }

        self.cancel_reconnect_timer();
        self.manual_disconnect.store(false, Ordering::SeqCst);
        self.set_state(ConnectionState::Connecting).await;
        self.publish_status().await;

        match self.adapter.do_connect().await {
            Ok(()) => {
                self.attempts.store(0, Ordering::SeqCst);
                *self.last_error.write().await = None;
                self.set_state(ConnectionState::Connected).await;
                self.adapter.on_connected().await;

                tracing::info!(adapter = %self.name, "Adapter connected");
                self.publish_status().await;
            }
            Err(e) => {
                *self.last_error.write().await = Some(LastError::from(&e));
                self.set_state(ConnectionState::Error).await;
                self.adapter.on_error(&e).await;

                tracing::warn!(adapter = %self.name, error = %e, "Adapter connect failed");
                self.publish_status().await;
                self.schedule_reconnect();
            }
        }
    }

    /// Disconnect and stay down until the next manual `connect`
    ///
    /// Cancels the pending reconnect timer and suppresses any reconnect an
    /// in-flight close event would otherwise schedule.
    pub async fn disconnect(&self) {
        self.manual_disconnect.store(true, Ordering::SeqCst);
        self.cancel_reconnect_timer();
        self.adapter.do_disconnect().await;
        self.set_state(ConnectionState::Disconnected).await;
        self.adapter.on_disconnected().await;

        tracing::info!(adapter = %self.name, "Adapter disconnected");
        self.publish_status().await;
    }

    /// Handle an asynchronous transport close not caused by `disconnect`
    pub async fn handle_connection_closed(self: &Arc<Self>) {
        if self.manual_disconnect.load(Ordering::SeqCst) {
            tracing::debug!(adapter = %self.name, "Close event after manual disconnect, ignoring");
            return;
        }

        self.set_state(ConnectionState::Disconnected).await;
        tracing::warn!(adapter = %self.name, "Connection closed unexpectedly");
        self.publish_status().await;
        self.schedule_reconnect();
    }

    /// Handle an asynchronous transport error not caused by `disconnect`
    pub async fn handle_connection_error(self: &Arc<Self>, error: ConnectError) {
        if self.manual_disconnect.load(Ordering::SeqCst) {
            tracing::debug!(adapter = %self.name, "Error event after manual disconnect, ignoring");
            return;
        }

        *self.last_error.write().await = Some(LastError::from(&error));
        self.set_state(ConnectionState::Error).await;
        self.adapter.on_error(&error).await;

        tracing::warn!(adapter = %self.name, error = %error, "Connection error");
        self.publish_status().await;
        self.schedule_reconnect();
    }

    /// Arm the one-shot reconnect timer
    ///
    /// No-op when a timer is already pending. Stops silently once attempts
    /// are exhausted; a later manual `connect` starts a fresh cycle.
    pub fn schedule_reconnect(self: &Arc<Self>) {
        let mut timer = self.reconnect_timer.lock();
        if timer.as_ref().is_some_and(|handle| !handle.is_finished()) {
            tracing::trace!(adapter = %self.name, "Reconnect already pending");
            return;
        }

        let attempts = self.attempts.load(Ordering::SeqCst);
        if attempts >= self.policy.max_attempts {
            tracing::warn!(
                adapter = %self.name,
                attempts = attempts,
                "Reconnect attempts exhausted, waiting for manual connect"
            );
            return;
        }

        let delay = self.policy.delay_for(attempts);
        self.attempts.store(attempts + 1, Ordering::SeqCst);

        let manager = Arc::clone(self);
        *timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if manager.manual_disconnect.load(Ordering::SeqCst) {
                return;
            }
            // Release the timer slot first; connect() aborts whatever handle
            // it finds there, which would be this very task.
            manager.reconnect_timer.lock().take();
            manager.connect().await;
        }));

        tracing::debug!(
            adapter = %self.name,
            attempt = attempts + 1,
            delay_ms = delay.as_millis(),
            "Reconnect scheduled"
        );
    }

    async fn set_state(&self, state: ConnectionState) {
        *self.state.write().await = state;
    }

    fn cancel_reconnect_timer(&self) {
        if let Some(handle) = self.reconnect_timer.lock().take() {
            handle.abort();
        }
    }

    async fn publish_status(&self) {
        // Nobody listening is fine
        let _ = self.status_tx.send(self.status_snapshot().await);
    }
}

impl std::fmt::Debug for ConnectionLifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionLifecycleManager")
            .field("name", &self.name)
            .field("attempts", &self.attempts.load(Ordering::SeqCst))
            .finish()
    }
}
