//! Envelope (session_id, node_id, event_id) per protocol_spec §2 / §7.1.
//! EnvelopeState tracks current node and injects envelope into each event.

use crate::event::ProtocolEvent;
use serde_json::Value;

/// Envelope fields recommended for each message (protocol_spec §2, §7.1).
#[derive(Clone, Debug, Default)]
pub struct Envelope {
    /// Session ID; constant within a session.
    pub session_id: Option<String>,
    /// Node run ID for the current span (from node_enter to node_exit).
    pub node_id: Option<String>,
    /// Per-message sequence number; monotonically increasing within a stream.
    pub event_id: Option<u64>,
}

impl Envelope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    pub fn with_node_id(mut self, id: impl Into<String>) -> Self {
        self.node_id = Some(id.into());
        self
    }

    pub fn with_event_id(mut self, id: u64) -> Self {
        self.event_id = Some(id);
        self
    }

    /// Merges envelope fields into the given JSON object (top-level only).
    /// Does not overwrite existing keys.
    pub fn inject_into(&self, obj: &mut Value) {
        let Some(obj) = obj.as_object_mut() else {
            return;
        };
        if let Some(ref id) = self.session_id {
            obj.entry("session_id")
                .or_insert_with(|| Value::String(id.clone()));
        }
        if let Some(ref id) = self.node_id {
            obj.entry("node_id")
                .or_insert_with(|| Value::String(id.clone()));
        }
        if let Some(id) = self.event_id {
            obj.entry("event_id")
                .or_insert_with(|| Value::Number(serde_json::Number::from(id)));
        }
    }
}

/// Envelope state for one turn: session_id, the active phase tag (set by the
/// caller as phases change, e.g. "llm", "hook", or a tool_call_id), and the
/// next event_id. Unlike a graph engine there's no per-node span to infer
/// automatically, so `node_id` is set explicitly via [`Self::set_node_id`].
pub struct EnvelopeState {
    pub session_id: String,
    pub current_node_id: String,
    pub next_event_id: u64,
}

impl EnvelopeState {
    pub fn new(session_id: String) -> Self {
        Self {
            session_id,
            current_node_id: String::new(),
            next_event_id: 1,
        }
    }

    /// Sets the active phase tag carried as `node_id` on subsequent events.
    pub fn set_node_id(&mut self, node_id: impl Into<String>) {
        self.current_node_id = node_id.into();
    }

    /// Injects envelope into the event value and advances the event counter.
    pub fn inject_into(&mut self, value: &mut Value) {
        let node_id = if self.current_node_id.is_empty() {
            "turn"
        } else {
            self.current_node_id.as_str()
        };
        let env = Envelope::new()
            .with_session_id(&self.session_id)
            .with_node_id(node_id)
            .with_event_id(self.next_event_id);
        self.next_event_id += 1;
        env.inject_into(value);
    }

    /// Builds the envelope for the reply line (§6).
    pub fn reply_envelope(&self) -> Envelope {
        let node_id = if self.current_node_id.is_empty() {
            "turn"
        } else {
            self.current_node_id.as_str()
        };
        Envelope::new()
            .with_session_id(&self.session_id)
            .with_node_id(node_id)
            .with_event_id(self.next_event_id)
    }
}

/// Converts a protocol event to JSON and injects envelope using the given state.
/// Returns the final value (type + payload + session_id, node_id, event_id).
pub fn to_json(
    event: &ProtocolEvent,
    state: &mut EnvelopeState,
) -> Result<Value, serde_json::Error> {
    let mut value = event.to_value()?;
    state.inject_into(&mut value);
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ProtocolEvent;

    #[test]
    fn envelope_inject() {
        let mut obj = serde_json::json!({"type":"usage"});
        let env = Envelope::new()
            .with_session_id("sess-1")
            .with_node_id("llm")
            .with_event_id(1);
        env.inject_into(&mut obj);
        assert_eq!(obj["session_id"], "sess-1");
        assert_eq!(obj["node_id"], "llm");
        assert_eq!(obj["event_id"], 1);
        assert_eq!(obj["type"], "usage");
    }

    #[test]
    fn to_json_injects_envelope_and_advances_event_id() {
        let ev = ProtocolEvent::Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        };
        let mut state = EnvelopeState::new("run-123".to_string());
        let value = to_json(&ev, &mut state).unwrap();
        assert_eq!(value["type"], "usage");
        assert_eq!(value["session_id"], "run-123");
        assert_eq!(value["node_id"], "turn");
        assert_eq!(value["event_id"], 1);
        assert_eq!(state.next_event_id, 2);
    }

    #[test]
    fn set_node_id_tags_subsequent_events() {
        let ev = ProtocolEvent::ToolStart {
            tool_call_id: "call-1".to_string(),
            server: "github".to_string(),
            tool: "search_repos".to_string(),
            arguments: serde_json::json!({}),
        };
        let mut state = EnvelopeState::new("run-123".to_string());
        state.set_node_id("call-1");
        let value = to_json(&ev, &mut state).unwrap();
        assert_eq!(value["node_id"], "call-1");
    }
}
