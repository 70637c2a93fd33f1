//! HookRunner: invokes the sandboxed create/next lifecycle hooks (§4.6).
//!
//! The sandbox itself (a single-threaded cooperative script runtime, from the
//! engine's perspective a blocking RPC) is out of scope here; [`HookSandbox`]
//! is the seam, with execution bounded by [`HOOK_BUDGET`] the way a
//! subprocess RPC call is bounded in the teacher's MCP session handling.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::capabilities::Capabilities;
use super::error::EngineError;
use super::message::Message;
use super::mcp_catalog::McpServerConfig;
use super::options::CompletionOptions;

/// Per-call execution budget for a hook invocation.
pub const HOOK_BUDGET: Duration = Duration::from_secs(30);

/// A direct handoff to another assistant, re-entering the engine under a new
/// stack frame (§4.8).
#[derive(Clone, Debug)]
pub struct Delegate {
    pub agent_id: String,
    pub messages: Vec<Message>,
    pub options: Option<CompletionOptions>,
}

/// Response from the pre-LLM `create` hook.
#[derive(Clone, Debug, Default)]
pub struct HookCreateResponse {
    pub messages: Option<Vec<Message>>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub route: Option<String>,
    pub metadata: Option<Value>,
    pub audio: Option<Value>,
    pub mcp_servers: Option<Vec<McpServerConfig>>,
    pub uses: Option<Value>,
    pub delegate: Option<Delegate>,
}

/// Response from the post-LLM `next` hook.
#[derive(Clone, Debug, Default)]
pub struct NextHookResponse {
    pub data: Option<Value>,
    pub delegate: Option<Delegate>,
}

/// Payload passed to the `next` hook: the messages sent, the LLM's
/// completion, and the tool catalog in effect for the turn.
#[derive(Clone, Debug)]
pub struct NextHookPayload {
    pub messages: Vec<Message>,
    pub completion: Value,
    pub tools: Vec<super::mcp_catalog::ToolSpec>,
}

/// The sandboxed script runtime the engine calls into but does not
/// implement. Real sandboxes are out of scope; only test doubles live here.
#[async_trait]
pub trait HookSandbox: Send + Sync {
    async fn create(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<(HookCreateResponse, Option<CompletionOptions>), EngineError>;

    async fn next(
        &self,
        payload: &NextHookPayload,
        options: &CompletionOptions,
    ) -> Result<(NextHookResponse, Option<CompletionOptions>), EngineError>;
}

/// Invokes `create`/`next` against a sandbox with a bounded execution
/// budget; a timeout surfaces as a fatal [`EngineError::HookError`].
pub struct HookRunner<'a> {
    sandbox: &'a dyn HookSandbox,
    budget: Duration,
}

impl<'a> HookRunner<'a> {
    pub fn new(sandbox: &'a dyn HookSandbox) -> Self {
        Self {
            sandbox,
            budget: HOOK_BUDGET,
        }
    }

    pub fn with_budget(sandbox: &'a dyn HookSandbox, budget: Duration) -> Self {
        Self { sandbox, budget }
    }

    pub async fn create(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<(HookCreateResponse, Option<CompletionOptions>), EngineError> {
        tokio::time::timeout(self.budget, self.sandbox.create(messages, options))
            .await
            .map_err(|_| EngineError::HookError("create hook exceeded execution budget".to_string()))?
    }

    pub async fn next(
        &self,
        payload: &NextHookPayload,
        options: &CompletionOptions,
    ) -> Result<(NextHookResponse, Option<CompletionOptions>), EngineError> {
        tokio::time::timeout(self.budget, self.sandbox.next(payload, options))
            .await
            .map_err(|_| EngineError::HookError("next hook exceeded execution budget".to_string()))?
    }
}

/// Unused marker kept to document that `Capabilities` flows through hook
/// overrides in `CompletionOptions` rather than being hook-specific.
#[allow(dead_code)]
fn _capabilities_flow_through_options(_c: Capabilities) {}
