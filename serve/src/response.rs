//! Sends a single JSON value as a WebSocket text frame.

use axum::extract::ws::{Message, WebSocket};
use serde::Serialize;

pub(crate) async fn send_json<T: Serialize>(
    socket: &mut WebSocket,
    value: &T,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let text = serde_json::to_string(value)?;
    socket.send(Message::Text(text)).await?;
    Ok(())
}
