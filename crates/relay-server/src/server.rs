use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use relay_core::RelayError;
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;

use crate::bootstrap::ListenerLauncher;
use crate::client::{self, SessionOptions};
use crate::config::ServerConfig;
use crate::hub::{spawn_hub, HubHandle};

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub hub: HubHandle,
    pub session: SessionOptions,
    pub started_at: DateTime<Utc>,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Create and start the server. Returns a handle to shut it down.
pub async fn start(
    config: ServerConfig,
    launcher: Arc<dyn ListenerLauncher>,
) -> Result<ServerHandle, RelayError> {
    config.validate()?;
    let listener = tokio::net::TcpListener::bind(config.addr.as_str())
        .await
        .map_err(|e| RelayError::Config(format!("could not bind {}: {e}", config.addr)))?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| RelayError::Config(format!("could not read bound address: {e}")))?;

    let (hub, hub_task) = spawn_hub(launcher, config.command_capacity);

    let app_state = AppState {
        hub: hub.clone(),
        session: SessionOptions {
            queue_capacity: config.queue_capacity,
            heartbeat_interval: Duration::from_secs(config.heartbeat_interval_secs),
        },
        started_at: Utc::now(),
    };
    let router = build_router(app_state);

    tracing::info!(addr = %local_addr, "Relay server started");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        let shutdown = async {
            let _ = shutdown_rx.await;
        };
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
        {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok(ServerHandle {
        addr: local_addr,
        hub,
        shutdown_tx: Some(shutdown_tx),
        server_task: server,
        _hub_task: hub_task,
    })
}

/// Handle returned by `start()` — keeps background tasks alive.
pub struct ServerHandle {
    pub addr: SocketAddr,
    pub hub: HubHandle,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server_task: tokio::task::JoinHandle<()>,
    _hub_task: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// Stop accepting connections and wait for the server task to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.server_task).await;
    }
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    client::handle_ws_connection(socket, state.hub, state.session).await;
}

/// Health check HTTP endpoint.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.hub.stats().await {
        Some(stats) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "healthy",
                "subscribers": stats.subscribers,
                "listener": stats.listener,
                "ledgerSize": stats.ledger_size,
                "buffered": stats.buffered,
                "startedAt": state.started_at.to_rfc3339(),
            })),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "unavailable" })),
        ),
    }
}
