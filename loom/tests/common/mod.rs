//! Shared fixtures for the engine integration tests: a minimal in-memory
//! `ChatStore`, static assistant/connector registries, and an `McpClient`
//! double controllable per test. Mirrors the test doubles already used in
//! `engine::coordinator`'s own unit tests, built standalone here since these
//! tests exercise the crate from outside (only the public `engine::*` API).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use loom::engine::{
    AssistantConfig, AssistantRegistry, Chat, ChatStore, CompletionOptions, Connector,
    ConnectorRegistry, EngineServices, InterruptController, McpClient, McpClientResolver,
    McpToolInfo, Message, MessageFilter, ResumeRecord, StackRegistry, StreamWriter, ToolCallOutcome,
    ToolSample, TraceRecorder, TurnContext, TurnResources,
};

#[derive(Default)]
pub struct RecordingStore {
    chats: Mutex<HashMap<String, Chat>>,
    messages: Mutex<HashMap<String, Vec<Message>>>,
    pub resumes: Mutex<Vec<ResumeRecord>>,
}

#[async_trait]
impl ChatStore for RecordingStore {
    async fn get_chat(&self, chat_id: &str) -> Result<Option<Chat>, loom::engine::EngineError> {
        Ok(self.chats.lock().unwrap().get(chat_id).cloned())
    }
    async fn create_chat(&self, chat: Chat) -> Result<(), loom::engine::EngineError> {
        self.chats.lock().unwrap().insert(chat.chat_id.clone(), chat);
        Ok(())
    }
    async fn delete_chat(&self, chat_id: &str) -> Result<(), loom::engine::EngineError> {
        self.chats.lock().unwrap().remove(chat_id);
        Ok(())
    }
    async fn get_messages(
        &self,
        chat_id: &str,
        _filter: MessageFilter,
    ) -> Result<Vec<Message>, loom::engine::EngineError> {
        Ok(self.messages.lock().unwrap().get(chat_id).cloned().unwrap_or_default())
    }
    async fn save_messages(&self, chat_id: &str, messages: &[Message]) -> Result<(), loom::engine::EngineError> {
        self.messages
            .lock()
            .unwrap()
            .entry(chat_id.to_string())
            .or_default()
            .extend_from_slice(messages);
        Ok(())
    }
    async fn delete_messages(
        &self,
        _chat_id: &str,
        _filter: Option<MessageFilter>,
    ) -> Result<(), loom::engine::EngineError> {
        Ok(())
    }
    async fn get_resume(&self, _chat_id: &str) -> Result<Option<ResumeRecord>, loom::engine::EngineError> {
        Ok(self.resumes.lock().unwrap().last().cloned())
    }
    async fn save_resume(&self, record: ResumeRecord) -> Result<(), loom::engine::EngineError> {
        self.resumes.lock().unwrap().push(record);
        Ok(())
    }
    async fn delete_resume(&self, _chat_id: &str) -> Result<(), loom::engine::EngineError> {
        Ok(())
    }
}

pub struct StaticAssistants(pub Vec<AssistantConfig>);

#[async_trait]
impl AssistantRegistry for StaticAssistants {
    async fn get(&self, assistant_id: &str) -> Option<AssistantConfig> {
        self.0.iter().find(|a| a.id == assistant_id).cloned()
    }
}

pub struct StaticConnectors(pub HashMap<String, Arc<dyn Connector>>);

impl ConnectorRegistry for StaticConnectors {
    fn get(&self, connector_id: &str) -> Option<Arc<dyn Connector>> {
        self.0.get(connector_id).cloned()
    }
}

pub struct NoMcpServers;

impl McpClientResolver for NoMcpServers {
    fn resolve(&self, _server_id: &str) -> Option<Arc<dyn McpClient>> {
        None
    }
}

pub struct StaticMcpServers(pub HashMap<String, Arc<dyn McpClient>>);

impl McpClientResolver for StaticMcpServers {
    fn resolve(&self, server_id: &str) -> Option<Arc<dyn McpClient>> {
        self.0.get(server_id).cloned()
    }
}

/// An MCP client whose `call_tool` outcome is driven by a closure, so each
/// test can script success/failure sequences (e.g. "fail once, then
/// succeed" or "always fail retryably").
pub struct ScriptedToolClient<F>
where
    F: Fn(usize) -> ToolCallOutcome + Send + Sync,
{
    calls: Mutex<usize>,
    outcome_for: F,
}

impl<F> ScriptedToolClient<F>
where
    F: Fn(usize) -> ToolCallOutcome + Send + Sync,
{
    pub fn new(outcome_for: F) -> Self {
        Self {
            calls: Mutex::new(0),
            outcome_for,
        }
    }
}

#[async_trait]
impl<F> McpClient for ScriptedToolClient<F>
where
    F: Fn(usize) -> ToolCallOutcome + Send + Sync,
{
    async fn list_tools(&self, _cursor: Option<&str>) -> Result<Vec<McpToolInfo>, loom::engine::EngineError> {
        Ok(vec![])
    }
    async fn list_samples(&self, _kind: &str, _tool: &str) -> Result<Vec<ToolSample>, loom::engine::EngineError> {
        Ok(vec![])
    }
    async fn call_tool(
        &self,
        _tool: &str,
        _args: &Value,
        _cancel: &CancellationToken,
    ) -> Result<ToolCallOutcome, loom::engine::EngineError> {
        let mut calls = self.calls.lock().unwrap();
        let attempt = *calls;
        *calls += 1;
        Ok((self.outcome_for)(attempt))
    }
    async fn call_tools_parallel(
        &self,
        calls: &[(loom::engine::ToolCall, Value)],
        cancel: &CancellationToken,
    ) -> Result<Vec<ToolCallOutcome>, loom::engine::EngineError> {
        let mut out = Vec::with_capacity(calls.len());
        for (_call, args) in calls {
            out.push(self.call_tool("ignored", args, cancel).await?);
        }
        Ok(out)
    }
}

/// A connector whose `stream` panics, for exercising flush-on-panic (the
/// panic fires inside phase 11, before any tool handling).
pub struct PanicConnector;

#[async_trait]
impl Connector for PanicConnector {
    fn id(&self) -> &str {
        "panic"
    }
    fn setting(&self) -> loom::engine::ConnectorSetting {
        loom::engine::ConnectorSetting::default()
    }
    async fn stream(
        &self,
        _messages: &[Message],
        _options: &CompletionOptions,
        _cancel: &CancellationToken,
        _on_chunk: &(dyn Fn(loom::engine::ConnectorChunk) + Send + Sync),
    ) -> Result<loom::engine::CompletionResponse, loom::engine::EngineError> {
        panic!("connector exploded mid-stream");
    }
}

pub fn resources() -> TurnResources {
    let (writer, _rx) = StreamWriter::channel("test-session");
    TurnResources {
        stack: Arc::new(StackRegistry::new()),
        interrupt: Arc::new(InterruptController::new()),
        trace: Arc::new(TraceRecorder::new()),
        writer,
    }
}

pub fn ctx(chat_id: &str) -> TurnContext {
    TurnContext {
        context_id: "ctx-1".to_string(),
        chat_id: Some(chat_id.to_string()),
        request_id: "req-1".to_string(),
        trace_id: "trace-1".to_string(),
        authorized: true,
        skip_history: true,
    }
}

pub fn services_with(
    store: Arc<dyn ChatStore>,
    assistants: Vec<AssistantConfig>,
    connectors: HashMap<String, Arc<dyn Connector>>,
    mcp_clients: Arc<dyn McpClientResolver>,
) -> EngineServices {
    EngineServices {
        chat_store: store,
        assistants: Arc::new(StaticAssistants(assistants)),
        connectors: Arc::new(StaticConnectors(connectors)),
        mcp_clients,
        hook_sandbox: None,
    }
}
