//! Client command handling
//!
//! Routes each parsed command to the matching hub operation. Command
//! failures are logged and never close the connection.

use crate::hub::Hub;
use crate::protocol::ClientCommand;
use crate::registry::Client;
use std::sync::Arc;

/// Dispatches incoming client commands to the hub
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Handle one command from a client
    pub async fn dispatch(hub: &Hub, client: &Arc<Client>, command: ClientCommand) {
        let client_id = client.id();

        tracing::trace!(client_id = %client_id, command = ?command, "Command received");

        match command {
            ClientCommand::Subscribe { channel } => {
                hub.subscribe(client_id, &channel).await;
            }
            ClientCommand::Unsubscribe { channel } => {
                hub.unsubscribe(client_id, &channel).await;
            }
            ClientCommand::JoinRoom { room_id, role } => {
                hub.join_room(client_id, &room_id, &role).await;
            }
            ClientCommand::LeaveRoom { room_id } => {
                hub.leave_room(client_id, &room_id).await;
            }
            ClientCommand::PresencePing => {
                hub.update_activity(client_id).await;
            }
            ClientCommand::CueAction { message_id, action } => {
                hub.cue_action(client_id, &message_id, &action).await;
            }
            ClientCommand::State { channel, data } => {
                hub.broadcast(&channel, data).await;
            }
            ClientCommand::Ack => {
                hub.mark_alive(client_id).await;
            }
        }
    }
}
