//! HTTP and WebSocket server for the beacon daemon.
//!
//! The server:
//! - Serves the signaling WebSocket on `/ws`
//! - Spawns a ConnectionHandler for each upgraded socket
//! - Exposes `/` and `/health` liveness payloads and a `/stats` snapshot
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  BeaconServer   │
//! │  (axum, TCP)    │
//! └───────┬─────────┘
//!         │ GET /ws (upgrade)
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│  MessageRouter  │────▶│  RegistryHandle │
//! │   (per client)  │     │                 │     │                 │
//! └─────────────────┘     └────────┬────────┘     └─────────────────┘
//!                                  │ outbound queue of the peer
//!                                  ▼
//!                         ┌─────────────────┐
//!                         │ peer's writer   │
//!                         └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Per-connection errors are logged and never stop the server

mod connection;

pub use connection::{CloseReason, ConnectionError, ConnectionHandler};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use beacon_core::ConnectionId;

use crate::config::{BrokerConfig, ConnectionSettings};
use crate::registry::RegistryHandle;
use crate::router::MessageRouter;

/// WebSocket endpoint path
pub const WS_PATH: &str = "/ws";

/// Shared state passed to axum handlers.
#[derive(Clone)]
struct AppState {
    registry: RegistryHandle,
    router: MessageRouter,
    settings: ConnectionSettings,
    connection_counter: Arc<AtomicU64>,
    cancel_token: CancellationToken,
    started_at: DateTime<Utc>,
}

/// Signaling server for the beacon daemon.
pub struct BeaconServer {
    config: BrokerConfig,

    /// Handle to the connection registry
    registry: RegistryHandle,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Connection counter for generating connection ids
    connection_counter: Arc<AtomicU64>,
}

impl BeaconServer {
    /// Creates a new server.
    ///
    /// # Arguments
    ///
    /// * `config` - Broker configuration (bind address and connection settings)
    /// * `registry` - Handle to the connection registry
    /// * `cancel_token` - Token for graceful shutdown
    pub fn new(
        config: BrokerConfig,
        registry: RegistryHandle,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            config,
            registry,
            cancel_token,
            connection_counter: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Binds the configured address.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let addr = self.config.bind_address();
        TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr,
                error: e.to_string(),
            })
    }

    /// Runs the server on the configured address.
    ///
    /// Does not return until the cancellation token is triggered.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Serves on an already bound listener until cancelled.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let local_addr: Option<SocketAddr> = listener.local_addr().ok();
        info!(addr = ?local_addr, path = WS_PATH, "Beacon server listening");

        let token = self.cancel_token.clone();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await
            .map_err(|e| ServerError::Serve(e.to_string()))?;

        info!("Server shutdown complete");
        Ok(())
    }

    /// Builds the axum router with all routes.
    pub fn router(&self) -> Router {
        let settings = self.config.connection;
        let state = AppState {
            registry: self.registry.clone(),
            router: MessageRouter::new(self.registry.clone(), settings.write_timeout()),
            settings,
            connection_counter: Arc::clone(&self.connection_counter),
            cancel_token: self.cancel_token.clone(),
            started_at: Utc::now(),
        };

        Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/stats", get(stats_handler))
            .route(WS_PATH, get(ws_handler))
            .with_state(state)
    }
}

/// GET /
async fn root_handler() -> Json<Value> {
    Json(json!({ "message": "WebSocket server running" }))
}

/// GET /health
async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Body of GET /stats.
#[derive(Debug, Serialize)]
struct StatsResponse {
    channels: usize,
    participants: usize,
    connections: usize,
    started_at: DateTime<Utc>,
}

/// GET /stats
async fn stats_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>, StatusCode> {
    match state.registry.stats().await {
        Ok(stats) => Ok(Json(StatsResponse {
            channels: stats.channels,
            participants: stats.participants,
            connections: stats.connections,
            started_at: state.started_at,
        })),
        Err(e) => {
            warn!(error = %e, "Stats unavailable");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

/// GET /ws
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.max_message_size(state.settings.max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

/// Runs one upgraded socket to completion.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id =
        ConnectionId::new(state.connection_counter.fetch_add(1, Ordering::Relaxed));

    let handler = ConnectionHandler::new(
        connection_id,
        state.registry,
        state.router,
        state.settings,
        state.cancel_token,
    );

    match handler.run(socket).await {
        CloseReason::Failed(e) => debug!(connection = %connection_id, error = %e, "Connection failed"),
        reason => debug!(connection = %connection_id, reason = %reason, "Connection finished"),
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: String, error: String },

    #[error("Server error: {0}")]
    Serve(String),
}
