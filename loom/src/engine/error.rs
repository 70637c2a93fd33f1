//! Error kinds for the turn engine.
//!
//! One enum carries every semantic error a `Stream` turn can fail with, plus
//! the substring-based retryability classifier used by the tool executor.

use thiserror::Error;

/// Whether a failed tool call is worth retrying on the next LLM turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Retryable {
    Yes,
    No,
}

impl Retryable {
    pub fn as_bool(self) -> bool {
        matches!(self, Retryable::Yes)
    }
}

/// Substrings that mark a tool error as definitely not worth retrying.
const NON_RETRYABLE_MARKERS: &[&str] = &[
    "network",
    "timeout",
    "connection",
    "unauthorized",
    "forbidden",
    "unavailable",
    "failed to select",
    "context canceled",
    "context deadline",
    "server error",
    "internal error",
];

/// Substrings that mark a tool error as retryable (the LLM may correct its call).
const RETRYABLE_MARKERS: &[&str] = &[
    "invalid",
    "required",
    "missing",
    "validation",
    "schema",
    "type",
    "format",
    "parse",
    "argument",
    "parameter",
];

/// Classifies a tool error message per the non-retryable / retryable substring
/// rules; anything matching neither list defaults to retryable.
pub fn classify_tool_error(message: &str) -> Retryable {
    let lower = message.to_lowercase();
    if NON_RETRYABLE_MARKERS.iter().any(|m| lower.contains(m)) {
        return Retryable::No;
    }
    if RETRYABLE_MARKERS.iter().any(|m| lower.contains(m)) {
        return Retryable::Yes;
    }
    Retryable::Yes
}

/// Error kinds produced by the engine. Every variant maps to one semantic
/// kind named in the error handling design; no raw strings cross module
/// boundaries unwrapped.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("context is not authorized")]
    Unauthorized,

    #[error("connector not specified")]
    ConnectorNotSpecified,

    #[error("connector not found: {0}")]
    ConnectorNotFound(String),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("hook error: {0}")]
    HookError(String),

    #[error("llm error: {0}")]
    LlmError(String),

    #[error("tool argument error: {0}")]
    ToolArgumentError(String),

    #[error("tool call error: {message}")]
    ToolCallError { message: String, retryable: bool },

    #[error("tool call(s) failed non-retryably: {0}")]
    ToolNonRetryable(String),

    #[error("tool retry attempts exhausted")]
    ToolRetryExhausted,

    #[error("llm returned no tool_calls on retry attempt")]
    LlmNoToolCallsOnRetry,

    #[error("turn cancelled")]
    Cancelled,

    #[error("turn interrupted")]
    Interrupted,

    #[error("assistant not found: {0}")]
    AssistantNotFound(String),

    #[error("delegation stack too deep (max {0})")]
    DelegationTooDeep(u32),

    #[error("interrupt target not found")]
    InterruptTargetNotFound,

    #[error("chat store error: {0}")]
    ChatStoreError(String),

    #[error("mcp error: {0}")]
    McpError(String),
}

impl EngineError {
    /// Error kind name as surfaced on `stream_end.error` / trace nodes.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Unauthorized => "Unauthorized",
            EngineError::ConnectorNotSpecified => "ConnectorNotSpecified",
            EngineError::ConnectorNotFound(_) => "ConnectorNotFound",
            EngineError::InvalidSchema(_) => "InvalidSchema",
            EngineError::HookError(_) => "HookError",
            EngineError::LlmError(_) => "LLMError",
            EngineError::ToolArgumentError(_) => "ToolArgumentError",
            EngineError::ToolCallError { .. } => "ToolCallError",
            EngineError::ToolNonRetryable(_) => "ToolNonRetryable",
            EngineError::ToolRetryExhausted => "ToolRetryExhausted",
            EngineError::LlmNoToolCallsOnRetry => "LLMNoToolCallsOnRetry",
            EngineError::Cancelled => "Cancelled",
            EngineError::Interrupted => "Interrupted",
            EngineError::AssistantNotFound(_) => "AssistantNotFound",
            EngineError::DelegationTooDeep(_) => "DelegationTooDeep",
            EngineError::InterruptTargetNotFound => "NotFound",
            EngineError::ChatStoreError(_) => "ChatStoreError",
            EngineError::McpError(_) => "McpError",
        }
    }
}
