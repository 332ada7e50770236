//! WebSocket entry point for game clients.
//!
//! # Connection Flow
//!
//! 1. Client connects via `GET /ws/spicy-dice`
//! 2. The socket is split; the write half goes to the connection's writer
//!    task and the read half to its reader
//! 3. Client and server exchange `{ "type", "payload" }` envelopes
//! 4. On disconnect, timeout or decode failure both tasks are cleaned up
//!
//! # Example
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:8080/ws/spicy-dice');
//!
//! ws.onmessage = (event) => {
//!   const { type, payload } = JSON.parse(event.data);
//!   if (type === 'error') {
//!     showError(payload.code, payload.message);
//!   }
//! };
//!
//! ws.send(JSON.stringify({
//!   type: 'play',
//!   payload: { client_id: 1, bet_amount: 25, bet_type: 'even' }
//! }));
//! ```

use axum::{
    extract::{
        State,
        ws::{WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures_util::StreamExt;

use super::{AppState, connection};

/// Upgrade an HTTP request to a game connection.
///
/// Client identity is carried in each request payload, so the upgrade itself
/// needs no parameters.
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drive an established WebSocket until both halves are done.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sender, receiver) = socket.split();
    connection::serve(state.engine, state.settings, sender, receiver).await;
}
