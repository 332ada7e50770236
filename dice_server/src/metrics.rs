//! Prometheus metrics for monitoring the dice server.
//!
//! Metrics are recorded through the `metrics` facade and are only exported
//! when a Prometheus listener has been installed with [`init_metrics`].
//! Without one, every call here is a no-op.
//!
//! # Metrics Categories
//!
//! - **WebSocket Metrics**: Active connections, inbound messages, closes, dropped outbound messages
//! - **Game Metrics**: Bets by outcome, request errors by code
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use dice_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::websocket_connection_opened();
//! metrics::bet_resolved(true);
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// WebSocket Metrics
// ============================================================================

/// A connection was accepted.
pub fn websocket_connection_opened() {
    metrics::gauge!("websocket_connections_active").increment(1.0);
    metrics::counter!("websocket_connections_total").increment(1);
}

/// A connection finished its shared close.
pub fn websocket_connection_closed(reason: &'static str) {
    metrics::gauge!("websocket_connections_active").decrement(1.0);
    metrics::counter!("websocket_connections_closed_total", "reason" => reason).increment(1);
}

/// Increment inbound messages counter, labelled by envelope type.
pub fn websocket_message_received(message_type: &str) {
    metrics::counter!("websocket_messages_received",
        "type" => message_type.to_string()
    )
    .increment(1);
}

/// Increment outbound envelopes dropped because the queue was full or closed.
pub fn websocket_outbound_dropped(reason: &'static str) {
    metrics::counter!("websocket_outbound_dropped_total", "reason" => reason).increment(1);
}

// ============================================================================
// Game Metrics
// ============================================================================

/// Record a settled bet.
pub fn bet_resolved(won: bool) {
    let outcome = if won { "won" } else { "lost" };
    metrics::counter!("bets_total", "outcome" => outcome).increment(1);
}

/// Record a request that produced an `error` envelope.
pub fn request_failed(code: u16) {
    metrics::counter!("request_errors_total", "code" => code.to_string()).increment(1);
}
