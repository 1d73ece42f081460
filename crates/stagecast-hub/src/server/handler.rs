//! WebSocket handler
//!
//! Accepts upgraded connections and pumps messages between the socket and
//! the hub.

use crate::handlers::CommandDispatcher;
use crate::protocol::{ClientCommand, ServerMessage};
use crate::server::HubState;
use axum::{
    extract::{ws::Message, State, WebSocketUpgrade},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

/// WebSocket hub handler
pub async fn hub_handler(
    State(state): State<HubState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(state, socket))
}

/// Handle an upgraded WebSocket connection
async fn handle_socket(state: HubState, socket: axum::extract::ws::WebSocket) {
    // Outgoing message queue; per-client delivery order lives here
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(state.config().client_buffer);

    let client = state.hub().accept(tx);
    let client_id = client.id();

    tracing::info!(client_id = %client_id, "WebSocket connection established");

    let (mut ws_sink, mut ws_stream) = socket.split();

    // Receive commands from the socket
    let state_recv = state.clone();
    let client_recv = client.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = ws_stream.next().await {
            match msg {
                Ok(Message::Text(text)) => match ClientCommand::from_json(&text) {
                    Ok(command) => {
                        CommandDispatcher::dispatch(state_recv.hub(), &client_recv, command).await;
                    }
                    Err(e) => {
                        // Malformed commands are dropped, never fatal
                        tracing::debug!(
                            client_id = %client_recv.id(),
                            error = %e,
                            "Dropping unparseable message"
                        );
                    }
                },
                Ok(Message::Ping(_) | Message::Pong(_)) => {
                    tracing::trace!(client_id = %client_recv.id(), "Transport ping/pong");
                }
                Ok(Message::Binary(_)) => {
                    tracing::debug!(client_id = %client_recv.id(), "Binary messages not supported");
                }
                Ok(Message::Close(_)) => {
                    tracing::info!(client_id = %client_recv.id(), "Client closed connection");
                    break;
                }
                Err(e) => {
                    tracing::warn!(client_id = %client_recv.id(), error = %e, "WebSocket error");
                    break;
                }
            }
        }
    });

    // Pump hub messages out to the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(json) = msg.to_json() {
                if ws_sink.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        }

        let _ = ws_sink.close().await;
    });

    // End the session on socket close, pump exit, or hub eviction
    let client_close = client.clone();
    tokio::select! {
        _ = &mut recv_task => {
            tracing::debug!(client_id = %client_id, "Receive task ended");
        }
        _ = &mut send_task => {
            tracing::debug!(client_id = %client_id, "Send task ended");
        }
        () = client_close.wait_closed() => {
            tracing::debug!(client_id = %client_id, "Client evicted by hub");
        }
    }

    // Abort the surviving pumps so the socket halves are dropped; detached
    // tasks would keep the transport open and the evicted client's commands
    // flowing.
    recv_task.abort();
    send_task.abort();

    state.hub().disconnect_client(client_id).await;

    tracing::info!(client_id = %client_id, "WebSocket connection closed");
}
