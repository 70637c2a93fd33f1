//! The turn-execution engine: a fixed fifteen-phase coordinator (`Stream`)
//! that drives one assistant turn from input messages to a completed or
//! delegated response.
//!
//! Submodules are organized by concern rather than by call order: data model
//! (`message`, `options`, `capabilities`, `mcp_catalog`), collaborator seams
//! (`ports`, `hook`, `delegate`), per-turn bookkeeping (`stack`, `interrupt`,
//! `trace`, `stream_writer`, `buffer`, `history`), dispatch (`tool_executor`,
//! `connector`), and the coordinator itself.

pub mod buffer;
pub mod capabilities;
pub mod connector;
pub mod coordinator;
pub mod delegate;
pub mod error;
pub mod history;
pub mod hook;
pub mod interrupt;
pub mod mcp_catalog;
pub mod message;
pub mod options;
pub mod ports;
pub mod stack;
pub mod stream_writer;
pub mod tool_executor;
pub mod trace;

pub use buffer::{
    BufferedChat, BufferedMessage, BufferedMessageType, BufferedStep, FlushGuard, StepStatus,
    StepType,
};
pub use capabilities::{CapabilityResolver, Capabilities, VisionCapability};
pub use connector::MockConnector;
#[cfg(feature = "openai-connector")]
pub use connector::OpenAiConnector;
pub use coordinator::{
    stream, AssistantConfig, ConnectorRegistry, EngineServices, McpClientResolver, Response,
    StreamRequest, TurnContext, TurnResources, MAX_TOOL_RETRIES,
};
pub use delegate::{resolve_delegate_target, AssistantRegistry, DelegateRequest};
pub use error::{classify_tool_error, EngineError, Retryable};
pub use history::{filter_stored, with_history, HistoryOptions, HistoryResult, StoredMessage};
pub use hook::{
    Delegate, HookCreateResponse, HookRunner, HookSandbox, NextHookPayload, NextHookResponse,
    HOOK_BUDGET,
};
pub use interrupt::{InterruptController, InterruptKind, InterruptSignal};
pub use mcp_catalog::{
    format_tool_name, parse_tool_name, McpServerConfig, ToolCatalog, ToolSample, ToolSpec,
    MAX_MCP_TOOLS,
};
pub use message::{ContentPart, Message, MessageContent, Role, ToolCall, ToolCallFunction};
pub use options::{CompletionOptions, OptionsMerger, ResponseFormat, ToolChoiceMode};
pub use ports::{
    Chat, ChatStore, CompletionResponse, Connector, ConnectorChunk, ConnectorSetting, LlmUsage,
    McpClient, McpToolInfo, MessageFilter, ResumeRecord, ToolCallOutcome,
};
pub use stack::{StackFrame, StackFrameGuard, StackRegistry, MAX_STACK_DEPTH};
pub use stream_writer::{StreamWriter, TurnId};
pub use tool_executor::{all_non_retryable, any_failed, ClientResolver, ToolCallResult, ToolExecutor};
pub use trace::{NodeHandle, TraceNode, TraceNodeKind, TraceRecorder, TraceStatus};
