//! Individual client connection
//!
//! Represents a single connected dashboard/viewer and its state.

use crate::protocol::ServerMessage;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify, RwLock};
use uuid::Uuid;

/// Unique client identity, assigned on transport accept
pub type ClientId = Uuid;

/// The room a client currently belongs to, with its role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomMembership {
    pub room_id: String,
    pub role: String,
}

/// A single connected client
///
/// Owned exclusively by the registry; created on transport accept and
/// destroyed on transport close.
pub struct Client {
    /// Assigned identity
    id: ClientId,

    /// Channel to send messages to the transport
    sender: mpsc::Sender<ServerMessage>,

    /// Liveness flag, cleared by the heartbeat sweep and set by `ack`
    alive: AtomicBool,

    /// Set when the hub force-closes this client
    closed: AtomicBool,

    /// Wakes the transport task when the hub force-closes this client
    close_signal: Notify,

    /// Subscribed channel names (unordered, unique)
    subscriptions: RwLock<HashSet<String>>,

    /// Current room membership, at most one room at a time
    room: RwLock<Option<RoomMembership>>,

    /// Last observed client activity
    last_activity: RwLock<DateTime<Utc>>,
}

impl Client {
    /// Create a new client with a fresh identity
    pub fn new(sender: mpsc::Sender<ServerMessage>) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            sender,
            alive: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            close_signal: Notify::new(),
            subscriptions: RwLock::new(HashSet::new()),
            room: RwLock::new(None),
            last_activity: RwLock::new(Utc::now()),
        })
    }

    /// Get the client identity
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Check the liveness flag
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Set the liveness flag
    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    /// Add a channel subscription; idempotent
    pub async fn subscribe(&self, channel: &str) {
        self.subscriptions.write().await.insert(channel.to_string());
    }

    /// Remove a channel subscription; idempotent
    pub async fn unsubscribe(&self, channel: &str) {
        self.subscriptions.write().await.remove(channel);
    }

    /// Get all subscribed channels
    pub async fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.read().await.iter().cloned().collect()
    }

    /// Check if subscribed to a channel
    pub async fn is_subscribed(&self, channel: &str) -> bool {
        self.subscriptions.read().await.contains(channel)
    }

    /// Get the current room membership
    pub async fn room(&self) -> Option<RoomMembership> {
        self.room.read().await.clone()
    }

    /// Set the current room membership
    pub async fn set_room(&self, room_id: &str, role: &str) {
        *self.room.write().await = Some(RoomMembership {
            room_id: room_id.to_string(),
            role: role.to_string(),
        });
    }

    /// Clear room membership if it matches the given room
    pub async fn clear_room(&self, room_id: &str) {
        let mut room = self.room.write().await;
        if room.as_ref().is_some_and(|m| m.room_id == room_id) {
            *room = None;
        }
    }

    /// Refresh the activity timestamp
    pub async fn touch(&self) {
        *self.last_activity.write().await = Utc::now();
    }

    /// Get the last observed activity timestamp
    pub async fn last_activity(&self) -> DateTime<Utc> {
        *self.last_activity.read().await
    }

    /// Send a message to this client
    pub async fn send(
        &self,
        message: ServerMessage,
    ) -> Result<(), mpsc::error::SendError<ServerMessage>> {
        self.sender.send(message).await
    }

    /// Try to send a message (non-blocking)
    pub fn try_send(
        &self,
        message: ServerMessage,
    ) -> Result<(), mpsc::error::TrySendError<ServerMessage>> {
        self.sender.try_send(message)
    }

    /// Check if the transport is closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.sender.is_closed()
    }

    /// Force-close this client, waking its transport task
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.close_signal.notify_waiters();
    }

    /// Resolve once the hub force-closes this client
    pub async fn wait_closed(&self) {
        loop {
            let notified = self.close_signal.notified();
            if self.closed.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("alive", &self.alive.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_creation() {
        let (tx, _rx) = mpsc::channel(10);
        let client = Client::new(tx);

        assert!(client.is_alive());
        assert!(!client.is_closed());
        assert!(client.room().await.is_none());
        assert!(client.subscriptions().await.is_empty());
    }

    #[tokio::test]
    async fn test_subscriptions_are_idempotent() {
        let (tx, _rx) = mpsc::channel(10);
        let client = Client::new(tx);

        client.subscribe("poster").await;
        client.subscribe("poster").await;
        client.subscribe("overlay").await;

        assert_eq!(client.subscriptions().await.len(), 2);
        assert!(client.is_subscribed("poster").await);

        client.unsubscribe("poster").await;
        client.unsubscribe("poster").await;
        assert!(!client.is_subscribed("poster").await);
    }

    #[tokio::test]
    async fn test_room_membership() {
        let (tx, _rx) = mpsc::channel(10);
        let client = Client::new(tx);

        client.set_room("main", "operator").await;
        let membership = client.room().await.unwrap();
        assert_eq!(membership.room_id, "main");
        assert_eq!(membership.role, "operator");

        // Clearing a different room leaves membership intact
        client.clear_room("other").await;
        assert!(client.room().await.is_some());

        client.clear_room("main").await;
        assert!(client.room().await.is_none());
    }

    #[tokio::test]
    async fn test_liveness_flag() {
        let (tx, _rx) = mpsc::channel(10);
        let client = Client::new(tx);

        client.set_alive(false);
        assert!(!client.is_alive());
        client.set_alive(true);
        assert!(client.is_alive());
    }

    #[tokio::test]
    async fn test_close_wakes_waiter() {
        let (tx, _rx) = mpsc::channel(10);
        let client = Client::new(tx);

        let waiter = {
            let client = client.clone();
            tokio::spawn(async move { client.wait_closed().await })
        };

        client.close();
        waiter.await.unwrap();
        assert!(client.is_closed());
    }
}
