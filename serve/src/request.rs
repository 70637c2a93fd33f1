//! Wire protocol: what a client sends over the WebSocket and what it gets back.
//!
//! A `Run` request is answered by forwarding every wire event the engine's
//! [`loom::engine::StreamWriter`] emits for that turn (`stream_start` ...
//! content deltas ... `stream_end`), each as its own JSON text frame, in the
//! same envelope shape `stream-event` produces. `Ping` gets a `Pong` back
//! with no detour through the engine.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ClientRequest {
    Run(RunRequest),
    Ping(PingRequest),
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RunRequest {
    /// Correlates this run with the client's own bookkeeping; echoed back in
    /// error responses.
    pub id: String,
    pub assistant_id: String,
    /// `None` starts a fresh chat; history is skipped for that turn.
    pub chat_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PingRequest {
    pub id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ServerResponse {
    Pong(PongResponse),
    Error(ErrorResponse),
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct PongResponse {
    pub id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ErrorResponse {
    pub id: Option<String>,
    pub error: String,
}
