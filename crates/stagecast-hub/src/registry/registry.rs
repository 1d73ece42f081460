//! Connection registry
//!
//! Owns every active client, keyed by assigned identity.

use super::{Client, ClientId};
use crate::protocol::ServerMessage;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Tracks all active client connections
pub struct ConnectionRegistry {
    clients: DashMap<ClientId, Arc<Client>>,
}

impl ConnectionRegistry {
    /// Create a new registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
        }
    }

    /// Accept a transport connection and register a new client
    pub fn accept(&self, sender: mpsc::Sender<ServerMessage>) -> Arc<Client> {
        let client = Client::new(sender);
        self.clients.insert(client.id(), client.clone());

        tracing::debug!(client_id = %client.id(), "Client registered");

        client
    }

    /// Get a client by identity
    pub fn get(&self, client_id: ClientId) -> Option<Arc<Client>> {
        self.clients.get(&client_id).map(|r| r.clone())
    }

    /// Deregister a client, returning it for cascading cleanup
    pub fn remove(&self, client_id: ClientId) -> Option<Arc<Client>> {
        let removed = self.clients.remove(&client_id).map(|(_, client)| client);

        if removed.is_some() {
            tracing::debug!(client_id = %client_id, "Client deregistered");
        }

        removed
    }

    /// Send a message to one client, best-effort
    ///
    /// A send failure is logged and swallowed; it never propagates.
    pub async fn send_to_client(&self, client_id: ClientId, message: ServerMessage) -> bool {
        let Some(client) = self.get(client_id) else {
            tracing::trace!(client_id = %client_id, "Send to unknown client dropped");
            return false;
        };

        if let Err(e) = client.send(message).await {
            tracing::warn!(
                client_id = %client_id,
                error = %e,
                "Failed to send to client"
            );
            return false;
        }

        true
    }

    /// Get all active clients
    pub fn all_clients(&self) -> Vec<Arc<Client>> {
        self.clients.iter().map(|r| r.clone()).collect()
    }

    /// Get the total number of active clients
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Check if a client is registered
    pub fn has_client(&self, client_id: ClientId) -> bool {
        self.clients.contains_key(&client_id)
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("clients", &self.clients.len())
            .finish()
    }
}
