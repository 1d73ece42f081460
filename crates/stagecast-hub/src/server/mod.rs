//! Hub server setup
//!
//! WebSocket server configuration, routes, and startup.

mod handler;
mod state;

pub use handler::hub_handler;
pub use state::HubState;

use crate::heartbeat::HeartbeatMonitor;
use crate::hub::Hub;
use crate::rooms::InMemoryReplayProvider;
use axum::{extract::State, routing::get, Json, Router};
use stagecast_common::{AppError, AppResult, BindConflictMode, HubConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Create the hub router
pub fn create_router() -> Router<HubState> {
    Router::new()
        .route("/hub", get(hub_handler))
        .route("/health", get(health_check))
        .route("/stats", get(stats))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Operational diagnostics for the host process
async fn stats(State(state): State<HubState>) -> Json<serde_json::Value> {
    let hub = state.hub();

    let channels: serde_json::Map<String, serde_json::Value> = hub
        .channel_counts()
        .into_iter()
        .map(|(channel, count)| (channel, count.into()))
        .collect();

    let rooms: serde_json::Map<String, serde_json::Value> = hub
        .room_ids()
        .into_iter()
        .map(|room_id| {
            let presence = hub.get_presence(&room_id);
            (room_id, serde_json::json!(presence))
        })
        .collect();

    let adapters = hub.adapter_statuses().await;

    Json(serde_json::json!({
        "clients": hub.client_count(),
        "channels": channels,
        "rooms": rooms,
        "adapters": adapters,
        "heartbeat": state.heartbeat().is_running(),
    }))
}

/// Build the complete application
pub fn create_app(state: HubState) -> Router {
    create_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Initialize all dependencies and create `HubState`
pub fn create_hub_state(config: HubConfig) -> HubState {
    let replay_provider = Arc::new(InMemoryReplayProvider::new(config.replay_backlog));
    let hub = Hub::new(replay_provider);

    let heartbeat = HeartbeatMonitor::new(
        hub.clone(),
        Duration::from_millis(config.heartbeat_interval_ms),
    );
    heartbeat.clone().start();

    HubState::new(hub, heartbeat, config)
}

/// Run the hub server
///
/// A bind conflict honors the configured degradation mode: in passive mode
/// another process owns the endpoint and this one stays inert.
pub async fn run_server(app: Router, addr: SocketAddr, mode: BindConflictMode) -> AppResult<()> {
    tracing::info!("Starting hub server on {}", addr);

    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            return match mode {
                BindConflictMode::Passive => {
                    tracing::warn!(
                        addr = %addr,
                        "Endpoint already bound, staying passive"
                    );
                    std::future::pending::<()>().await;
                    Ok(())
                }
                BindConflictMode::Fail => Err(AppError::BindConflict(addr.to_string())),
            };
        }
        Err(e) => return Err(AppError::Config(format!("Failed to bind to {addr}: {e}"))),
    };

    tracing::info!("Hub listening on ws://{}/hub", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::Config(format!("Server error: {e}")))?;

    Ok(())
}

/// Run the complete hub server with configuration
pub async fn run(config: HubConfig) -> AppResult<()> {
    let addr: SocketAddr = config
        .address()
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid listen address: {e}")))?;
    let mode = config.bind_conflict;

    let state = create_hub_state(config);
    let app = create_app(state);

    run_server(app, addr, mode).await
}
