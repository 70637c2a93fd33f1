//! # Loom
//!
//! The core turn-execution engine for an LLM assistant runtime: a fixed
//! fifteen-phase coordinator (`Stream`) that drives one chat turn from input
//! messages to a streamed reply, with MCP tool dispatch, hook-script
//! extension points, and delegation to nested assistants.
//!
//! ## Design principles
//!
//! - **One coordinator, fixed phases**: every turn runs the same sequence —
//!   permission check, stack frame push, history assembly, hook scripts, LLM
//!   stream, tool retry loop, completion — rather than a configurable graph.
//! - **Collaborators behind traits**: chat persistence ([`ChatStore`]),
//!   per-provider LLM access ([`Connector`]), MCP tool access ([`McpClient`]),
//!   and hook-script execution ([`HookSandbox`]) are all seams the embedding
//!   application implements; the engine only calls them.
//! - **Exactly-once wire events**: [`StreamWriter`] emits a typed envelope
//!   per turn (`stream_start` ... content deltas ... `stream_end`), closing
//!   the stream exactly once even under delegation or interruption.
//!
//! ## Main modules
//!
//! All public API lives under [`engine`]:
//!
//! - [`engine::coordinator`]: [`stream`] — the `Stream` entrypoint,
//!   [`AssistantConfig`], [`EngineServices`], [`TurnResources`].
//! - [`engine::message`]: [`Message`], [`ToolCall`] — the turn's data model.
//! - [`engine::options`]: [`CompletionOptions`], [`OptionsMerger`] — the
//!   three-layer assistant/context/hook option merge.
//! - [`engine::ports`]: [`ChatStore`], [`Connector`], [`McpClient`] — the
//!   collaborator traits an embedding application implements.
//! - [`engine::hook`]: [`HookRunner`], [`HookSandbox`] — the create/next
//!   hook-script extension points, including delegation.
//! - [`engine::mcp_catalog`]: [`ToolCatalog`] — MCP tool discovery and
//!   name-mangling for the LLM's tool list.
//! - [`engine::tool_executor`]: [`ToolExecutor`] — parallel tool dispatch
//!   with sequential-fallback retry classification.
//! - [`engine::stack`]: [`StackRegistry`] — the per-turn delegation stack,
//!   depth-capped at [`MAX_STACK_DEPTH`].
//! - [`engine::interrupt`]: [`InterruptController`] — graceful/force
//!   cancellation.
//! - [`engine::trace`]: [`TraceRecorder`] — the turn's execution trace tree.
//! - [`engine::stream_writer`]: [`StreamWriter`] — the wire-event emitter.
//! - [`engine::buffer`]: [`BufferedChat`], [`FlushGuard`] — idempotent
//!   message/step persistence.
//! - [`engine::history`]: [`with_history`] — chat history loading and
//!   input-overlap trimming.
//! - [`engine::error`]: [`EngineError`] — the turn-level error enum.
//!
//! Key types are re-exported at crate root for convenience:
//! `use loom::{stream, EngineServices, TurnResources, TurnContext, StreamRequest};`.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use loom::engine::{
//!     AssistantConfig, ChatStore, CompletionOptions, Connector, ConnectorRegistry,
//!     EngineServices, InterruptController, McpClient, McpClientResolver, Message,
//!     MockConnector, Response, StackRegistry, StreamRequest, StreamWriter, TraceRecorder,
//!     TurnContext, TurnResources,
//! };
//!
//! struct NoAssistants;
//!
//! #[async_trait]
//! impl loom::engine::AssistantRegistry for NoAssistants {
//!     async fn get(&self, assistant_id: &str) -> Option<AssistantConfig> {
//!         (assistant_id == "echo").then(|| AssistantConfig {
//!             id: "echo".to_string(),
//!             connector_id: "mock".to_string(),
//!             options: CompletionOptions::default(),
//!             mcp_servers: vec![],
//!         })
//!     }
//! }
//!
//! struct NoChats;
//!
//! #[async_trait::async_trait]
//! impl ChatStore for NoChats {
//!     async fn get_chat(&self, _chat_id: &str) -> Result<Option<loom::engine::Chat>, loom::engine::EngineError> { Ok(None) }
//!     async fn create_chat(&self, _chat: loom::engine::Chat) -> Result<(), loom::engine::EngineError> { Ok(()) }
//!     async fn delete_chat(&self, _chat_id: &str) -> Result<(), loom::engine::EngineError> { Ok(()) }
//!     async fn get_messages(&self, _chat_id: &str, _filter: loom::engine::MessageFilter) -> Result<Vec<Message>, loom::engine::EngineError> { Ok(vec![]) }
//!     async fn save_messages(&self, _chat_id: &str, _messages: &[Message]) -> Result<(), loom::engine::EngineError> { Ok(()) }
//!     async fn delete_messages(&self, _chat_id: &str, _filter: Option<loom::engine::MessageFilter>) -> Result<(), loom::engine::EngineError> { Ok(()) }
//!     async fn get_resume(&self, _chat_id: &str) -> Result<Option<loom::engine::ResumeRecord>, loom::engine::EngineError> { Ok(None) }
//!     async fn save_resume(&self, _record: loom::engine::ResumeRecord) -> Result<(), loom::engine::EngineError> { Ok(()) }
//!     async fn delete_resume(&self, _chat_id: &str) -> Result<(), loom::engine::EngineError> { Ok(()) }
//! }
//!
//! struct OneConnector(Arc<dyn Connector>);
//!
//! impl ConnectorRegistry for OneConnector {
//!     fn get(&self, _connector_id: &str) -> Option<Arc<dyn Connector>> {
//!         Some(self.0.clone())
//!     }
//! }
//!
//! struct NoMcpServers;
//!
//! impl McpClientResolver for NoMcpServers {
//!     fn resolve(&self, _server_id: &str) -> Option<Arc<dyn McpClient>> {
//!         None
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let services = EngineServices {
//!     chat_store: Arc::new(NoChats),
//!     assistants: Arc::new(NoAssistants),
//!     connectors: Arc::new(OneConnector(Arc::new(MockConnector::new("mock")))),
//!     mcp_clients: Arc::new(NoMcpServers),
//!     hook_sandbox: None,
//! };
//! let (writer, _events) = StreamWriter::channel("session-1");
//! let resources = TurnResources {
//!     stack: Arc::new(StackRegistry::new()),
//!     interrupt: Arc::new(InterruptController::new()),
//!     trace: Arc::new(TraceRecorder::new()),
//!     writer,
//! };
//! let ctx = TurnContext {
//!     context_id: "ctx-1".to_string(),
//!     chat_id: None,
//!     request_id: "req-1".to_string(),
//!     trace_id: "trace-1".to_string(),
//!     authorized: true,
//!     skip_history: true,
//! };
//! let request = StreamRequest {
//!     assistant_id: "echo".to_string(),
//!     input_messages: vec![Message::user("hello, world!")],
//!     options_override: None,
//!     parent_frame_id: None,
//!     referer: None,
//! };
//! let response: Response = loom::stream(&services, &resources, &ctx, request).await.unwrap();
//! println!("{}", response.content);
//! # }
//! ```
//!
//! Run the echo example: `cargo run -p loom-examples --example echo`

pub mod engine;

pub use engine::{
    stream, AssistantConfig, EngineServices, Response, StreamRequest, TurnContext, TurnResources,
};
