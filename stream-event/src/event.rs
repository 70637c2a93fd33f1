//! Protocol-level event types: wire shape for one turn's stream (§6).
//! State-carrying variants use `serde_json::Value`; the bridge in loom
//! serializes typed payloads into it.

use serde::Serialize;
use serde_json::Value;

/// One assistant identity, as carried in `stream_start`.
#[derive(Clone, Debug, Default, Serialize)]
pub struct AssistantInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub avatar: Option<String>,
    pub description: Option<String>,
}

/// Protocol event: wire shape for one stream event (type + payload).
/// Envelope (session/node/event id) is applied separately by callers.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProtocolEvent {
    StreamStart {
        context_id: String,
        chat_id: Option<String>,
        request_id: String,
        trace_id: String,
        timestamp_ms: i64,
        assistant: AssistantInfo,
        metadata: Value,
    },
    ContentDelta {
        payload: Value,
    },
    ToolStart {
        tool_call_id: String,
        server: String,
        tool: String,
        arguments: Value,
    },
    ToolComplete {
        tool_call_id: String,
        server: String,
        tool: String,
        result: Value,
    },
    ToolFail {
        tool_call_id: String,
        server: String,
        tool: String,
        error: String,
    },
    Usage {
        prompt_tokens: u32,
        completion_tokens: u32,
        total_tokens: u32,
    },
    StreamEnd {
        context_id: String,
        request_id: String,
        trace_id: String,
        timestamp_ms: i64,
        duration_ms: i64,
        status: String,
        error: Option<String>,
        usage: Option<Value>,
        metadata: Value,
    },
    Custom {
        value: Value,
    },
}

impl ProtocolEvent {
    /// Serializes this event to a JSON object (type + payload only; no envelope).
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
