//! StreamWriter: emits envelope-tagged wire events for one turn (§6, §4.1).
//!
//! Grounded in the channel-based writer the graph engine used to push
//! `StreamEvent`s to a subscriber; rebuilt here to push [`ProtocolEvent`]s
//! instead, and to guarantee `stream_end` fires exactly once per turn
//! regardless of which phase ends the stream (normal completion, error, or
//! a forced interrupt racing the main path).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde_json::Value;
use stream_event::{to_json, EnvelopeState, ProtocolEvent};
use tokio::sync::mpsc;

use super::error::EngineError;
use super::ports::LlmUsage;

/// Turn identity carried on `stream_start`/`stream_end` (§6).
#[derive(Clone, Debug)]
pub struct TurnId {
    pub context_id: String,
    pub chat_id: Option<String>,
    pub request_id: String,
    pub trace_id: String,
}

/// Writes envelope-tagged [`ProtocolEvent`]s onto an mpsc channel. Cloning a
/// `StreamWriter` shares the same channel and end-guard, so every clone
/// (main path, delegated sub-turns, tool tasks) observes the same
/// exactly-once `stream_end`.
#[derive(Clone)]
pub struct StreamWriter {
    tx: mpsc::UnboundedSender<Value>,
    state: std::sync::Arc<Mutex<EnvelopeState>>,
    ended: std::sync::Arc<AtomicBool>,
}

impl StreamWriter {
    /// Creates a writer and returns it paired with the receiving end of its
    /// channel; the receiver is typically forwarded to a websocket/SSE sink.
    pub fn channel(session_id: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let writer = Self {
            tx,
            state: std::sync::Arc::new(Mutex::new(EnvelopeState::new(session_id.into()))),
            ended: std::sync::Arc::new(AtomicBool::new(false)),
        };
        (writer, rx)
    }

    /// Tags subsequent events with the active phase (e.g. a tool_call_id
    /// while a tool runs, or "llm" while streaming a completion).
    pub fn set_phase(&self, node_id: impl Into<String>) {
        self.state
            .lock()
            .expect("envelope state poisoned")
            .set_node_id(node_id);
    }

    fn emit(&self, event: ProtocolEvent) -> Result<(), EngineError> {
        let mut state = self.state.lock().expect("envelope state poisoned");
        let value = to_json(&event, &mut state).map_err(|e| EngineError::HookError(e.to_string()))?;
        drop(state);
        // A closed receiver means nothing is listening anymore; not a turn
        // failure, so this is dropped rather than propagated.
        let _ = self.tx.send(value);
        Ok(())
    }

    pub fn stream_start(
        &self,
        turn: &TurnId,
        timestamp_ms: i64,
        assistant: stream_event::event::AssistantInfo,
        metadata: Value,
    ) -> Result<(), EngineError> {
        self.emit(ProtocolEvent::StreamStart {
            context_id: turn.context_id.clone(),
            chat_id: turn.chat_id.clone(),
            request_id: turn.request_id.clone(),
            trace_id: turn.trace_id.clone(),
            timestamp_ms,
            assistant,
            metadata,
        })
    }

    pub fn content_delta(&self, payload: Value) -> Result<(), EngineError> {
        self.emit(ProtocolEvent::ContentDelta { payload })
    }

    pub fn tool_start(
        &self,
        tool_call_id: impl Into<String>,
        server: impl Into<String>,
        tool: impl Into<String>,
        arguments: Value,
    ) -> Result<(), EngineError> {
        self.emit(ProtocolEvent::ToolStart {
            tool_call_id: tool_call_id.into(),
            server: server.into(),
            tool: tool.into(),
            arguments,
        })
    }

    pub fn tool_complete(
        &self,
        tool_call_id: impl Into<String>,
        server: impl Into<String>,
        tool: impl Into<String>,
        result: Value,
    ) -> Result<(), EngineError> {
        self.emit(ProtocolEvent::ToolComplete {
            tool_call_id: tool_call_id.into(),
            server: server.into(),
            tool: tool.into(),
            result,
        })
    }

    pub fn tool_fail(
        &self,
        tool_call_id: impl Into<String>,
        server: impl Into<String>,
        tool: impl Into<String>,
        error: impl Into<String>,
    ) -> Result<(), EngineError> {
        self.emit(ProtocolEvent::ToolFail {
            tool_call_id: tool_call_id.into(),
            server: server.into(),
            tool: tool.into(),
            error: error.into(),
        })
    }

    pub fn usage(&self, usage: LlmUsage) -> Result<(), EngineError> {
        self.emit(ProtocolEvent::Usage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        })
    }

    pub fn custom(&self, value: Value) -> Result<(), EngineError> {
        self.emit(ProtocolEvent::Custom { value })
    }

    /// Emits `stream_end`, exactly once: a second call (from whichever path
    /// loses the race between normal completion and a forced interrupt) is
    /// a silent no-op.
    #[allow(clippy::too_many_arguments)]
    pub fn stream_end(
        &self,
        turn: &TurnId,
        timestamp_ms: i64,
        duration_ms: i64,
        status: impl Into<String>,
        error: Option<String>,
        usage: Option<LlmUsage>,
        metadata: Value,
    ) -> Result<(), EngineError> {
        if self.ended.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let usage_value = usage.map(|u| {
            serde_json::json!({
                "prompt_tokens": u.prompt_tokens,
                "completion_tokens": u.completion_tokens,
                "total_tokens": u.total_tokens,
            })
        });
        self.emit(ProtocolEvent::StreamEnd {
            context_id: turn.context_id.clone(),
            request_id: turn.request_id.clone(),
            trace_id: turn.trace_id.clone(),
            timestamp_ms,
            duration_ms,
            status: status.into(),
            error,
            usage: usage_value,
            metadata,
        })
    }

    pub fn has_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn() -> TurnId {
        TurnId {
            context_id: "ctx-1".to_string(),
            chat_id: Some("chat-1".to_string()),
            request_id: "req-1".to_string(),
            trace_id: "trace-1".to_string(),
        }
    }

    #[test]
    fn stream_start_then_content_delta_are_delivered_in_order() {
        let (writer, mut rx) = StreamWriter::channel("sess-1");
        writer
            .stream_start(&turn(), 0, Default::default(), Value::Null)
            .unwrap();
        writer.content_delta(serde_json::json!({"text": "hi"})).unwrap();
        let first = rx.try_recv().unwrap();
        assert_eq!(first["type"], "stream_start");
        let second = rx.try_recv().unwrap();
        assert_eq!(second["type"], "content_delta");
    }

    /// **Scenario**: `stream_end` is emitted exactly once even if called
    /// twice (normal completion racing a forced interrupt's cleanup path).
    #[test]
    fn stream_end_is_idempotent() {
        let (writer, mut rx) = StreamWriter::channel("sess-1");
        writer
            .stream_end(&turn(), 0, 0, "ok", None, None, Value::Null)
            .unwrap();
        writer
            .stream_end(&turn(), 0, 0, "cancelled", None, None, Value::Null)
            .unwrap();
        let first = rx.try_recv().unwrap();
        assert_eq!(first["status"], "ok");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn set_phase_tags_subsequent_events_node_id() {
        let (writer, mut rx) = StreamWriter::channel("sess-1");
        writer.set_phase("call-42");
        writer
            .tool_start("call-42", "github", "search_repos", serde_json::json!({}))
            .unwrap();
        let event = rx.try_recv().unwrap();
        assert_eq!(event["node_id"], "call-42");
    }
}
