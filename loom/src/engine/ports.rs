//! External collaborator traits (§6): chat store, MCP client, and connector.
//!
//! These are the seams the engine depends on but does not implement; only
//! in-repo test doubles live here. Real drivers (a persistence backend, a
//! provider-specific MCP client, per-provider connectors) are out of scope.

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::capabilities::Capabilities;
use super::error::EngineError;
use super::mcp_catalog::ToolSample;
use super::message::{Message, ToolCall};
use super::options::CompletionOptions;

/// A chat record as known to the chat store.
#[derive(Clone, Debug, Default)]
pub struct Chat {
    pub chat_id: String,
    pub last_connector: Option<String>,
    pub last_mode: Option<String>,
    pub updated_at: Option<i64>,
}

/// Filter for [`ChatStore::get_messages`].
#[derive(Clone, Debug, Default)]
pub struct MessageFilter {
    pub limit: Option<usize>,
}

/// A persisted resume record (a turn's buffered steps, kept for retry after
/// a failed or interrupted turn).
#[derive(Clone, Debug)]
pub struct ResumeRecord {
    pub chat_id: String,
    pub request_id: String,
    pub status: String,
    pub payload: Value,
}

/// The chat/kv persistence driver the engine depends on but does not
/// implement (§6). Any store backing this trait is out of scope of the
/// engine itself.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn get_chat(&self, chat_id: &str) -> Result<Option<Chat>, EngineError>;
    async fn create_chat(&self, chat: Chat) -> Result<(), EngineError>;
    async fn delete_chat(&self, chat_id: &str) -> Result<(), EngineError>;

    /// Oldest-first.
    async fn get_messages(
        &self,
        chat_id: &str,
        filter: MessageFilter,
    ) -> Result<Vec<Message>, EngineError>;
    async fn save_messages(&self, chat_id: &str, messages: &[Message]) -> Result<(), EngineError>;
    async fn delete_messages(
        &self,
        chat_id: &str,
        filter: Option<MessageFilter>,
    ) -> Result<(), EngineError>;

    async fn get_resume(&self, chat_id: &str) -> Result<Option<ResumeRecord>, EngineError>;
    async fn save_resume(&self, record: ResumeRecord) -> Result<(), EngineError>;
    async fn delete_resume(&self, chat_id: &str) -> Result<(), EngineError>;
}

/// Raw tool descriptor as returned by an MCP server's `tools/list`, before
/// the catalog prefixes its name.
#[derive(Clone, Debug)]
pub struct McpToolInfo {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
}

/// Outcome of one `tools/call` invocation.
#[derive(Clone, Debug)]
pub struct ToolCallOutcome {
    pub content: String,
    pub is_error: bool,
}

/// One server's MCP client (§6). Implementations talk stdio or HTTP
/// transport to an external tool server; only a mock lives in this repo.
#[async_trait]
pub trait McpClient: Send + Sync {
    async fn list_tools(&self, cursor: Option<&str>) -> Result<Vec<McpToolInfo>, EngineError>;

    /// Up to a handful of example invocations for one tool; empty when the
    /// server doesn't support or has none for `tool`.
    async fn list_samples(&self, kind: &str, tool: &str) -> Result<Vec<ToolSample>, EngineError>;

    async fn call_tool(
        &self,
        tool: &str,
        args: &Value,
        cancel: &CancellationToken,
    ) -> Result<ToolCallOutcome, EngineError>;

    async fn call_tools_parallel(
        &self,
        calls: &[(ToolCall, Value)],
        cancel: &CancellationToken,
    ) -> Result<Vec<ToolCallOutcome>, EngineError>;
}

/// Connector-declared static settings, including its capability flags.
#[derive(Clone, Debug, Default)]
pub struct ConnectorSetting {
    pub capabilities: Capabilities,
}

/// Final aggregated response from one LLM streaming call.
#[derive(Clone, Debug, Default)]
pub struct CompletionResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<LlmUsage>,
    pub finish_reason: Option<String>,
}

/// Token usage for one LLM call.
#[derive(Clone, Copy, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct LlmUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// One raw chunk of a streaming completion, passed through to the writer
/// verbatim as `content delta` (§6) — the engine does not interpret its shape.
#[derive(Clone, Debug)]
pub struct ConnectorChunk(pub Value);

/// A driver for one LLM provider (§2 LLMStreamer, §6 Connector interface).
/// Only `MockConnector` (tests) and a feature-gated `OpenAiConnector` live
/// in this repo; real per-provider connectors are out of scope.
#[async_trait]
pub trait Connector: Send + Sync {
    fn id(&self) -> &str;
    fn setting(&self) -> ConnectorSetting;

    /// Streams one completion, invoking `on_chunk` for every delta observed
    /// from the provider, and returns the aggregated response once the
    /// stream ends or `cancel` fires.
    async fn stream(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
        cancel: &CancellationToken,
        on_chunk: &(dyn Fn(ConnectorChunk) + Send + Sync),
    ) -> Result<CompletionResponse, EngineError>;
}
