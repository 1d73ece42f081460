//! Broadcast dispatcher
//!
//! Maps clients to channel subscriptions and fans published messages out to
//! every subscriber. One client's send failure never blocks the rest.

use crate::protocol::ServerMessage;
use crate::registry::{Client, ClientId, ConnectionRegistry};
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Fans published messages out to subscribed clients
pub struct BroadcastDispatcher {
    registry: Arc<ConnectionRegistry>,

    /// Channel name to subscriber identities
    subscriptions: DashMap<String, HashSet<ClientId>>,
}

impl BroadcastDispatcher {
    /// Create a new dispatcher over a registry
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            subscriptions: DashMap::new(),
        }
    }

    /// Subscribe a client to a channel; idempotent
    pub async fn subscribe(&self, client_id: ClientId, channel: &str) -> bool {
        let Some(client) = self.registry.get(client_id) else {
            return false;
        };

        client.subscribe(channel).await;
        self.subscriptions
            .entry(channel.to_string())
            .or_default()
            .insert(client_id);

        tracing::trace!(
            client_id = %client_id,
            channel = %channel,
            "Client subscribed"
        );

        true
    }

    /// Unsubscribe a client from a channel; idempotent
    ///
    /// Uses atomic map operations to avoid races when cleaning up empty
    /// channel entries.
    pub async fn unsubscribe(&self, client_id: ClientId, channel: &str) -> bool {
        let Some(client) = self.registry.get(client_id) else {
            return false;
        };

        client.unsubscribe(channel).await;
        self.subscriptions.alter(channel, |_, mut subscribers| {
            subscribers.remove(&client_id);
            subscribers
        });
        self.subscriptions
            .retain(|_, subscribers| !subscribers.is_empty());

        tracing::trace!(
            client_id = %client_id,
            channel = %channel,
            "Client unsubscribed"
        );

        true
    }

    /// Drop every subscription held by a departing client
    pub async fn remove_client(&self, client: &Client) {
        let channels = client.subscriptions().await;
        let client_id = client.id();

        for channel in &channels {
            self.subscriptions.alter(channel, |_, mut subscribers| {
                subscribers.remove(&client_id);
                subscribers
            });
        }
        self.subscriptions
            .retain(|_, subscribers| !subscribers.is_empty());

        if !channels.is_empty() {
            tracing::trace!(
                client_id = %client_id,
                channels = channels.len(),
                "Client subscriptions cleared"
            );
        }
    }

    /// Publish a `{channel, data}` broadcast to every subscriber
    pub async fn broadcast(&self, channel: &str, data: Value) -> usize {
        self.broadcast_message(channel, ServerMessage::broadcast(channel, data))
            .await
    }

    /// Fan any message out to the subscribers of a channel
    ///
    /// Per-client delivery order is preserved by each client's own queue;
    /// no ordering holds across clients or channels.
    pub async fn broadcast_message(&self, channel: &str, message: ServerMessage) -> usize {
        let subscribers: Vec<ClientId> = self
            .subscriptions
            .get(channel)
            .map(|entry| entry.iter().copied().collect())
            .unwrap_or_default();

        let mut sent = 0;
        for client_id in subscribers {
            let Some(client) = self.registry.get(client_id) else {
                continue;
            };
            if client.is_closed() {
                continue;
            }
            if let Err(e) = client.try_send(message.clone()) {
                // Isolated per-client failure; a full queue counts as a
                // failed delivery, never as backpressure on the rest
                tracing::warn!(
                    client_id = %client_id,
                    channel = %channel,
                    error = %e,
                    "Broadcast delivery failed for client"
                );
                continue;
            }
            sent += 1;
        }

        tracing::trace!(channel = %channel, sent = sent, "Message broadcast");

        sent
    }

    /// Get the number of subscribers for a channel
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.subscriptions
            .get(channel)
            .map_or(0, |entry| entry.len())
    }

    /// Get subscriber counts for every active channel
    pub fn channel_counts(&self) -> Vec<(String, usize)> {
        self.subscriptions
            .iter()
            .map(|entry| (entry.key().clone(), entry.len()))
            .collect()
    }
}

impl std::fmt::Debug for BroadcastDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastDispatcher")
            .field("channels", &self.subscriptions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn setup() -> (Arc<ConnectionRegistry>, BroadcastDispatcher) {
        let registry = Arc::new(ConnectionRegistry::new());
        let dispatcher = BroadcastDispatcher::new(registry.clone());
        (registry, dispatcher)
    }

    #[tokio::test]
    async fn test_subscriber_receives_broadcast() {
        let (registry, dispatcher) = setup();
        let (tx, mut rx) = mpsc::channel(10);
        let client = registry.accept(tx);

        dispatcher.subscribe(client.id(), "poster").await;
        let sent = dispatcher.broadcast("poster", json!({"action": "show"})).await;

        assert_eq!(sent, 1);
        let msg = rx.recv().await.unwrap();
        assert_eq!(
            msg,
            ServerMessage::broadcast("poster", json!({"action": "show"}))
        );
        // Exactly once
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_non_subscriber_receives_nothing() {
        let (registry, dispatcher) = setup();
        let (tx1, mut rx1) = mpsc::channel(10);
        let (tx2, mut rx2) = mpsc::channel(10);
        let subscriber = registry.accept(tx1);
        let _other = registry.accept(tx2);

        dispatcher.subscribe(subscriber.id(), "poster").await;
        dispatcher.broadcast("poster", json!(1)).await;

        assert!(rx1.recv().await.is_some());
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unsubscribed_client_receives_nothing() {
        let (registry, dispatcher) = setup();
        let (tx, mut rx) = mpsc::channel(10);
        let client = registry.accept(tx);

        dispatcher.subscribe(client.id(), "poster").await;
        dispatcher.unsubscribe(client.id(), "poster").await;
        let sent = dispatcher.broadcast("poster", json!(1)).await;

        assert_eq!(sent, 0);
        assert!(rx.try_recv().is_err());
        assert_eq!(dispatcher.subscriber_count("poster"), 0);
    }

    #[tokio::test]
    async fn test_subscribe_is_idempotent() {
        let (registry, dispatcher) = setup();
        let (tx, mut rx) = mpsc::channel(10);
        let client = registry.accept(tx);

        dispatcher.subscribe(client.id(), "poster").await;
        dispatcher.subscribe(client.id(), "poster").await;

        assert_eq!(dispatcher.subscriber_count("poster"), 1);
        dispatcher.broadcast("poster", json!(1)).await;
        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failed_send_does_not_block_others() {
        let (registry, dispatcher) = setup();
        let (tx1, rx1) = mpsc::channel(10);
        let (tx2, mut rx2) = mpsc::channel(10);
        let broken = registry.accept(tx1);
        let healthy = registry.accept(tx2);

        dispatcher.subscribe(broken.id(), "poster").await;
        dispatcher.subscribe(healthy.id(), "poster").await;
        drop(rx1);

        let sent = dispatcher.broadcast("poster", json!(1)).await;
        assert_eq!(sent, 1);
        assert!(rx2.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_full_queue_does_not_stall_fanout() {
        let (registry, dispatcher) = setup();
        // Tiny queue, receiver alive but never draining: the shape of a
        // dead-but-established peer
        let (tx1, _rx1) = mpsc::channel(1);
        let (tx2, mut rx2) = mpsc::channel(10);
        let stuck = registry.accept(tx1);
        let healthy = registry.accept(tx2);

        dispatcher.subscribe(stuck.id(), "cues").await;
        dispatcher.subscribe(healthy.id(), "cues").await;

        // First broadcast fills the stuck client's queue
        assert_eq!(dispatcher.broadcast("cues", json!(1)).await, 2);

        // Later fan-outs must complete and still reach everyone else
        let sent = dispatcher.broadcast("cues", json!(2)).await;
        assert_eq!(sent, 1);
        assert!(rx2.recv().await.is_some());
        assert!(rx2.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_per_client_order_preserved() {
        let (registry, dispatcher) = setup();
        let (tx, mut rx) = mpsc::channel(10);
        let client = registry.accept(tx);

        dispatcher.subscribe(client.id(), "cues").await;
        for i in 0..5 {
            dispatcher.broadcast("cues", json!(i)).await;
        }

        for i in 0..5 {
            match rx.recv().await.unwrap() {
                ServerMessage::Broadcast(envelope) => assert_eq!(envelope.data, json!(i)),
                other => panic!("unexpected message: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_remove_client_clears_all_channels() {
        let (registry, dispatcher) = setup();
        let (tx, _rx) = mpsc::channel(10);
        let client = registry.accept(tx);

        dispatcher.subscribe(client.id(), "a").await;
        dispatcher.subscribe(client.id(), "b").await;
        dispatcher.remove_client(&client).await;

        assert_eq!(dispatcher.subscriber_count("a"), 0);
        assert_eq!(dispatcher.subscriber_count("b"), 0);
        assert!(dispatcher.channel_counts().is_empty());
    }
}
