//! Hub façade
//!
//! Owns the client, subscription, and presence tables. All external access
//! goes through these operations; collaborators never touch the maps
//! directly, which is what preserves the membership invariants.

use crate::broadcast::BroadcastDispatcher;
use crate::lifecycle::{ConnectionLifecycleManager, StatusEvent};
use crate::protocol::ServerMessage;
use crate::registry::{Client, ClientId, ConnectionRegistry};
use crate::rooms::{
    room_channel, PresenceEntry, ReplayCoordinator, ReplayProvider, RoomPresenceTracker,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// The real-time distribution hub
pub struct Hub {
    registry: Arc<ConnectionRegistry>,
    dispatcher: Arc<BroadcastDispatcher>,
    presence: RoomPresenceTracker,
    replay: ReplayCoordinator,
    adapters: parking_lot::RwLock<HashMap<String, Arc<ConnectionLifecycleManager>>>,
}

impl Hub {
    /// Create a hub with an injected replay provider
    pub fn new(replay_provider: Arc<dyn ReplayProvider>) -> Arc<Self> {
        let registry = Arc::new(ConnectionRegistry::new());
        let dispatcher = Arc::new(BroadcastDispatcher::new(registry.clone()));

        Arc::new(Self {
            registry,
            dispatcher,
            presence: RoomPresenceTracker::new(),
            replay: ReplayCoordinator::new(replay_provider),
            adapters: parking_lot::RwLock::new(HashMap::new()),
        })
    }

    // === Connections ===

    /// Accept a transport connection
    pub fn accept(&self, sender: mpsc::Sender<ServerMessage>) -> Arc<Client> {
        self.registry.accept(sender)
    }

    /// Disconnect a client with cascading cleanup
    ///
    /// Removes subscriptions, performs the implicit room leave with a
    /// presence broadcast, and force-closes the transport.
    pub async fn disconnect_client(&self, client_id: ClientId) {
        let Some(client) = self.registry.remove(client_id) else {
            return;
        };

        self.dispatcher.remove_client(&client).await;

        if let Some(membership) = client.room().await {
            self.presence.remove(&membership.room_id, client_id);
            self.broadcast_presence(&membership.room_id).await;
        }

        client.close();

        tracing::info!(client_id = %client_id, "Client disconnected");
    }

    /// Set a client's liveness flag on probe acknowledgement
    pub async fn mark_alive(&self, client_id: ClientId) {
        if let Some(client) = self.registry.get(client_id) {
            client.set_alive(true);
            client.touch().await;
        }
    }

    // === Channels ===

    /// Subscribe a client to a channel
    pub async fn subscribe(&self, client_id: ClientId, channel: &str) -> bool {
        self.dispatcher.subscribe(client_id, channel).await
    }

    /// Unsubscribe a client from a channel
    pub async fn unsubscribe(&self, client_id: ClientId, channel: &str) -> bool {
        self.dispatcher.unsubscribe(client_id, channel).await
    }

    /// Publish a `{channel, data}` broadcast
    pub async fn broadcast(&self, channel: &str, data: Value) -> usize {
        self.dispatcher.broadcast(channel, data).await
    }

    /// Send a message to one client, best-effort
    pub async fn send_to_client(&self, client_id: ClientId, message: ServerMessage) -> bool {
        self.registry.send_to_client(client_id, message).await
    }

    // === Rooms ===

    /// Join a room, implicitly leaving the previous one
    ///
    /// Broadcasts the updated presence list to the room, then delivers the
    /// replay backlog privately to the joining client only.
    pub async fn join_room(&self, client_id: ClientId, room_id: &str, role: &str) -> bool {
        let Some(client) = self.registry.get(client_id) else {
            return false;
        };

        if let Some(previous) = client.room().await {
            if previous.room_id != room_id {
                self.leave_room_inner(&client, &previous.room_id).await;
            }
        }

        client.set_room(room_id, role).await;
        self.presence.insert(room_id, client_id, role);
        self.dispatcher
            .subscribe(client_id, &room_channel(room_id))
            .await;
        self.broadcast_presence(room_id).await;

        let snapshot = self.replay.snapshot(room_id).await;
        let presence = self.presence.snapshot(room_id);
        self.registry
            .send_to_client(client_id, ServerMessage::replay(room_id, snapshot, presence))
            .await;

        tracing::info!(client_id = %client_id, room_id = %room_id, role = %role, "Client joined room");

        true
    }

    /// Leave a room
    pub async fn leave_room(&self, client_id: ClientId, room_id: &str) -> bool {
        let Some(client) = self.registry.get(client_id) else {
            return false;
        };

        self.leave_room_inner(&client, room_id).await;

        tracing::info!(client_id = %client_id, room_id = %room_id, "Client left room");

        true
    }

    /// Refresh a client's activity timestamps and rebroadcast presence
    pub async fn update_activity(&self, client_id: ClientId) {
        let Some(client) = self.registry.get(client_id) else {
            return;
        };

        client.touch().await;
        if let Some(membership) = client.room().await {
            if self.presence.touch(&membership.room_id, client_id) {
                self.broadcast_presence(&membership.room_id).await;
            }
        }
    }

    /// Rebroadcast a cue action on the sender's current room channel
    pub async fn cue_action(&self, client_id: ClientId, message_id: &str, action: &str) {
        let Some(client) = self.registry.get(client_id) else {
            return;
        };

        let Some(membership) = client.room().await else {
            tracing::debug!(client_id = %client_id, "Cue action from client outside any room, ignoring");
            return;
        };

        self.dispatcher
            .broadcast(
                &room_channel(&membership.room_id),
                json!({ "messageId": message_id, "action": action }),
            )
            .await;
    }

    /// Get an immutable snapshot of a room's presence list
    pub fn get_presence(&self, room_id: &str) -> Vec<PresenceEntry> {
        self.presence.snapshot(room_id)
    }

    async fn leave_room_inner(&self, client: &Arc<Client>, room_id: &str) {
        self.presence.remove(room_id, client.id());
        self.dispatcher
            .unsubscribe(client.id(), &room_channel(room_id))
            .await;
        client.clear_room(room_id).await;
        self.broadcast_presence(room_id).await;
    }

    async fn broadcast_presence(&self, room_id: &str) {
        let presence = self.presence.snapshot(room_id);
        self.dispatcher
            .broadcast_message(
                &room_channel(room_id),
                ServerMessage::presence(room_id, presence),
            )
            .await;
    }

    // === Adapters ===

    /// Register an adapter lifecycle manager
    ///
    /// Its status transitions are forwarded onto the `status:{name}` channel
    /// so any subscriber can display the connection state.
    pub fn register_adapter(self: &Arc<Self>, manager: Arc<ConnectionLifecycleManager>) {
        let mut status_rx = manager.subscribe_status();
        let channel = format!("status:{}", manager.name());

        self.adapters
            .write()
            .insert(manager.name().to_string(), manager);

        let hub = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match status_rx.recv().await {
                    Ok(event) => {
                        let data = serde_json::to_value(&event).unwrap_or_default();
                        hub.dispatcher.broadcast(&channel, data).await;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(channel = %channel, lagged = n, "Status forwarder lagged behind");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    /// Get a registered adapter manager by name
    pub fn adapter(&self, name: &str) -> Option<Arc<ConnectionLifecycleManager>> {
        self.adapters.read().get(name).cloned()
    }

    /// Current status of every registered adapter
    pub async fn adapter_statuses(&self) -> Vec<StatusEvent> {
        let managers: Vec<_> = self.adapters.read().values().cloned().collect();

        let mut statuses = Vec::with_capacity(managers.len());
        for manager in managers {
            statuses.push(manager.status_snapshot().await);
        }
        statuses
    }

    // === Diagnostics ===

    /// Total number of connected clients
    pub fn client_count(&self) -> usize {
        self.registry.client_count()
    }

    /// Number of subscribers on a channel
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.dispatcher.subscriber_count(channel)
    }

    /// Subscriber counts for every active channel
    pub fn channel_counts(&self) -> Vec<(String, usize)> {
        self.dispatcher.channel_counts()
    }

    /// Ids of all rooms with online members
    pub fn room_ids(&self) -> Vec<String> {
        self.presence.room_ids()
    }

    /// All connected clients, for the heartbeat sweep
    pub fn clients(&self) -> Vec<Arc<Client>> {
        self.registry.all_clients()
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("clients", &self.registry.client_count())
            .field("rooms", &self.presence.room_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::TypedEvent;
    use crate::rooms::InMemoryReplayProvider;
    use serde_json::json;
    use tokio::sync::mpsc::Receiver;

    fn new_hub() -> (Arc<Hub>, Arc<InMemoryReplayProvider>) {
        let provider = Arc::new(InMemoryReplayProvider::new(10));
        (Hub::new(provider.clone()), provider)
    }

    async fn connect(hub: &Hub) -> (ClientId, Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(32);
        let client = hub.accept(tx);
        (client.id(), rx)
    }

    /// Skip typed room events until the next plain broadcast
    async fn next_broadcast(rx: &mut Receiver<ServerMessage>) -> (String, Value) {
        loop {
            match rx.recv().await.expect("channel closed") {
                ServerMessage::Broadcast(envelope) => return (envelope.channel, envelope.data),
                ServerMessage::Typed(_) => {}
            }
        }
    }

    #[tokio::test]
    async fn test_join_second_room_leaves_first() {
        let (hub, _) = new_hub();
        let (a, _rx) = connect(&hub).await;

        hub.join_room(a, "r1", "operator").await;
        assert_eq!(hub.get_presence("r1").len(), 1);

        hub.join_room(a, "r2", "operator").await;

        let r1 = hub.get_presence("r1");
        let r2 = hub.get_presence("r2");
        assert!(r1.is_empty());
        assert_eq!(r2.len(), 1);
        assert_eq!(r2[0].client_id, a);

        // Room channel subscriptions moved along
        assert_eq!(hub.subscriber_count("room:r1"), 0);
        assert_eq!(hub.subscriber_count("room:r2"), 1);
    }

    #[tokio::test]
    async fn test_join_delivers_private_replay() {
        let (hub, provider) = new_hub();
        provider.record("main", json!({"id": "m1"}));
        provider.pin("main", json!({"id": "p1"}));

        let (a, mut rx_a) = connect(&hub).await;
        hub.join_room(a, "main", "host").await;

        // Presence broadcast first, then the private replay
        match rx_a.recv().await.unwrap() {
            ServerMessage::Typed(TypedEvent::Presence { room_id, presence, .. }) => {
                assert_eq!(room_id, "main");
                assert_eq!(presence.len(), 1);
            }
            other => panic!("expected presence, got {other:?}"),
        }
        match rx_a.recv().await.unwrap() {
            ServerMessage::Typed(TypedEvent::Replay {
                room_id,
                messages,
                pinned_messages,
                presence,
                ..
            }) => {
                assert_eq!(room_id, "main");
                assert_eq!(messages, vec![json!({"id": "m1"})]);
                assert_eq!(pinned_messages, vec![json!({"id": "p1"})]);
                assert_eq!(presence.len(), 1);
            }
            other => panic!("expected replay, got {other:?}"),
        }

        // A second member gets presence but no replay of their own join twin
        let (b, mut rx_b) = connect(&hub).await;
        hub.join_room(b, "main", "viewer").await;

        match rx_b.recv().await.unwrap() {
            ServerMessage::Typed(TypedEvent::Presence { presence, .. }) => {
                assert_eq!(presence.len(), 2);
            }
            other => panic!("expected presence, got {other:?}"),
        }
        // Existing member sees the new presence list, never the replay
        match rx_a.recv().await.unwrap() {
            ServerMessage::Typed(TypedEvent::Presence { presence, .. }) => {
                assert_eq!(presence.len(), 2);
            }
            other => panic!("expected presence, got {other:?}"),
        }
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_disconnect_cascades_room_cleanup() {
        let (hub, _) = new_hub();
        let (a, _rx_a) = connect(&hub).await;
        let (b, mut rx_b) = connect(&hub).await;

        hub.join_room(a, "main", "host").await;
        hub.join_room(b, "main", "viewer").await;

        // Drain B's join-time messages
        while rx_b.try_recv().is_ok() {}

        hub.disconnect_client(a).await;

        assert_eq!(hub.client_count(), 1);
        let presence = hub.get_presence("main");
        assert_eq!(presence.len(), 1);
        assert_eq!(presence[0].client_id, b);

        // B observes the departure
        match rx_b.recv().await.unwrap() {
            ServerMessage::Typed(TypedEvent::Presence { presence, .. }) => {
                assert_eq!(presence.len(), 1);
                assert_eq!(presence[0].client_id, b);
            }
            other => panic!("expected presence, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_state_passthrough_and_cue_action() {
        let (hub, _) = new_hub();
        let (a, mut rx_a) = connect(&hub).await;
        let (b, mut rx_b) = connect(&hub).await;

        hub.subscribe(a, "overlay").await;
        hub.broadcast("overlay", json!({"visible": true})).await;
        let (channel, data) = next_broadcast(&mut rx_a).await;
        assert_eq!(channel, "overlay");
        assert_eq!(data, json!({"visible": true}));

        hub.join_room(a, "main", "host").await;
        hub.join_room(b, "main", "viewer").await;
        hub.cue_action(b, "m7", "show").await;

        let (channel, data) = next_broadcast(&mut rx_a).await;
        assert_eq!(channel, "room:main");
        assert_eq!(data, json!({"messageId": "m7", "action": "show"}));
        let (_, data_b) = next_broadcast(&mut rx_b).await;
        assert_eq!(data_b, data);

        // Outside a room the action is dropped
        let (c, mut rx_c) = connect(&hub).await;
        hub.cue_action(c, "m8", "hide").await;
        assert!(rx_c.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_update_activity_keeps_membership() {
        let (hub, _) = new_hub();
        let (a, _rx) = connect(&hub).await;

        hub.join_room(a, "main", "host").await;
        let before = hub.get_presence("main")[0].last_activity;

        hub.update_activity(a).await;

        let snapshot = hub.get_presence("main");
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot[0].last_activity >= before);
    }

    #[tokio::test]
    async fn test_adapter_status_forwarded_to_channel() {
        use crate::lifecycle::{BackoffPolicy, ConnectError, ConnectionAdapter};
        use async_trait::async_trait;

        struct AlwaysUp;

        #[async_trait]
        impl ConnectionAdapter for AlwaysUp {
            async fn do_connect(&self) -> Result<(), ConnectError> {
                Ok(())
            }
            async fn do_disconnect(&self) {}
        }

        let (hub, _) = new_hub();
        let (a, mut rx) = connect(&hub).await;
        hub.subscribe(a, "status:obs").await;

        let manager = ConnectionLifecycleManager::new(
            "obs",
            Arc::new(AlwaysUp),
            BackoffPolicy::default(),
        );
        hub.register_adapter(manager.clone());
        manager.connect().await;

        let (channel, data) = next_broadcast(&mut rx).await;
        assert_eq!(channel, "status:obs");
        assert_eq!(data["adapter"], "obs");
        assert_eq!(data["state"], "connecting");

        let (_, data) = next_broadcast(&mut rx).await;
        assert_eq!(data["state"], "connected");

        assert_eq!(hub.adapter_statuses().await.len(), 1);
        assert!(hub.adapter("obs").is_some());
    }
}
