//! WebSocket Handler
//!
//! Upgrades `/ws` requests and hands each socket to the connection core.
//!
//! ## Protocol
//!
//! **Client → Server** (text, case-insensitive, surrounding whitespace ignored):
//! - `get_dashboard_data` - one snapshot reply
//! - `start_stream` - a snapshot every stream interval until the connection ends
//! - anything else, text or binary - echoed back unchanged
//!
//! **Server → Client:**
//! - `{"timestamp": "...", "metrics": [...], "tableData": [...]}`
//! - echoed messages
//! - close frames with a status code naming the close cause

use std::sync::Arc;

use axum::{extract::WebSocketUpgrade, response::IntoResponse, Extension};
use tracing::debug;

use crate::connection::WebSocketTransport;
use crate::protocol::rest::error::RestError;
use crate::protocol::Handler;

/// Upgrade to a dashboard WebSocket connection.
///
/// Refused with 503 once shutdown has begun. The socket-level message limit
/// is one receive buffer above the configured maximum so that messages just
/// over the limit reach the reassembler and are closed with 1009.
pub async fn ws_upgrade(
    Extension(handler): Extension<Arc<Handler>>,
    ws: Option<WebSocketUpgrade>,
) -> Result<impl IntoResponse, RestError> {
    if handler.is_shutting_down() {
        return Err(RestError::service_unavailable("Server is shutting down"));
    }
    let Some(ws) = ws else {
        return Err(RestError::bad_request("Expected a WebSocket upgrade request"));
    };

    let config = &handler.config().websocket;
    let socket_limit = config.max_message_size.saturating_add(config.receive_buffer_size);
    let receive_buffer_size = config.receive_buffer_size;
    let keep_alive = config.keep_alive_interval();

    debug!(socket_limit, "ws_upgrade");
    Ok(ws
        .max_message_size(socket_limit)
        .max_frame_size(socket_limit)
        .on_upgrade(move |socket| async move {
            let transport = WebSocketTransport::new(socket, receive_buffer_size, keep_alive);
            handler.serve_connection(transport).await;
        }))
}
