//! HTTP/WebSocket API for the dice server.
//!
//! # Modules
//!
//! - [`websocket`]: Upgrade handler for `GET /ws/spicy-dice`
//! - [`connection`]: Per-client reader/writer pair and request dispatch
//!
//! # Endpoints Overview
//!
//! - `GET /ws/spicy-dice` - Establish WebSocket connection
//! - `GET /health` - Server health status
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use dice_server::api::{create_router, AppState};
//! use dice_server::config::ConnectionSettings;
//! use spicy_dice::{Dice, GameConfig, MemoryLedger, PlayEngine};
//! use std::sync::Arc;
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!
//! let ledger = Arc::new(MemoryLedger::new());
//! let engine = PlayEngine::new(ledger.clone(), Arc::new(Dice::default()), GameConfig::default())?;
//!
//! let state = AppState {
//!     engine: Arc::new(engine),
//!     ledger,
//!     settings: ConnectionSettings::default(),
//! };
//!
//! let app = create_router(state);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively for development. In production, configure
//! appropriate origins, methods, and headers.

pub mod connection;
pub mod websocket;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
};
use serde_json::json;
use spicy_dice::{LedgerStore, PlayEngine};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::config::ConnectionSettings;

/// Application state shared across all HTTP handlers and WebSocket connections.
///
/// # Fields
///
/// - `engine`: Play engine every connection dispatches to
/// - `ledger`: Store behind the engine, used for health checks
/// - `settings`: Timing and buffering for new connections
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<PlayEngine>,
    pub ledger: Arc<dyn LedgerStore>,
    pub settings: ConnectionSettings,
}

/// Create the API router with all endpoints and middleware.
///
/// ```text
/// GET  /health          - Health check
/// GET  /ws/spicy-dice   - WebSocket
/// ```
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ws/spicy-dice", get(websocket::websocket_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` if the ledger store answers, or `503 Service Unavailable`.
///
/// # Example
///
/// ```bash
/// curl http://localhost:8080/health
/// # {"status":"healthy","database":true,"version":"1.0.0","timestamp":"2026-10-17T10:30:00Z"}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_healthy = match state.ledger.health_check().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Ledger health check failed: {}", e);
            false
        }
    };

    let status_code = if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if db_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_healthy,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
