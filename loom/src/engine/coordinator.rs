//! The `Stream` coordinator: the fifteen-phase per-turn pipeline (§4.1).
//!
//! Grounded in the teacher's ReAct runner phase sequencing
//! (`agent/react/runner/runner.rs`) and its `protocol/stream.rs` event
//! emission, generalized from a configurable graph run to this engine's
//! fixed phase list.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::buffer::{BufferedChat, BufferedMessageType, FlushGuard, StepStatus, StepType};
use super::delegate::{resolve_delegate_target, AssistantRegistry, DelegateRequest};
use super::error::EngineError;
use super::hook::{HookRunner, HookSandbox, NextHookPayload};
use super::history::{with_history, HistoryOptions};
use super::interrupt::InterruptController;
use super::mcp_catalog::{McpServerConfig, ToolCatalog};
use super::message::{Message, Role, ToolCall};
use super::options::{CompletionOptions, OptionsMerger};
use super::ports::{ChatStore, Connector, ConnectorChunk, LlmUsage, McpClient};
use super::stack::StackRegistry;
use super::stream_writer::{StreamWriter, TurnId};
use super::tool_executor::{all_non_retryable, any_failed, ToolExecutor};
use super::trace::{TraceNodeKind, TraceRecorder};

pub const MAX_TOOL_RETRIES: u32 = 3;

/// Static configuration for one assistant, as loaded by [`AssistantRegistry`].
#[derive(Clone, Debug)]
pub struct AssistantConfig {
    pub id: String,
    pub connector_id: String,
    pub options: CompletionOptions,
    pub mcp_servers: Vec<McpServerConfig>,
}

/// Resolves a connector id to a live [`Connector`]; connectors are
/// registered by the embedding application, not the engine.
pub trait ConnectorRegistry: Send + Sync {
    fn get(&self, connector_id: &str) -> Option<Arc<dyn Connector>>;
}

/// Resolves an MCP server id to a live client.
pub trait McpClientResolver: Send + Sync {
    fn resolve(&self, server_id: &str) -> Option<Arc<dyn McpClient>>;
}

/// Per-turn request to [`stream`].
#[derive(Clone, Debug)]
pub struct StreamRequest {
    pub assistant_id: String,
    pub input_messages: Vec<Message>,
    pub options_override: Option<CompletionOptions>,
    pub parent_frame_id: Option<String>,
    pub referer: Option<String>,
}

/// Context created by the entry layer, shared by every frame in a turn
/// (including delegated ones).
#[derive(Clone, Debug)]
pub struct TurnContext {
    pub context_id: String,
    pub chat_id: Option<String>,
    pub request_id: String,
    pub trace_id: String,
    pub authorized: bool,
    pub skip_history: bool,
}

/// Result of one `Stream` call.
#[derive(Clone, Debug, Default)]
pub struct Response {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<LlmUsage>,
    pub data: Option<Value>,
}

/// The collaborators the coordinator depends on for one engine instance.
/// Shared across every turn; per-turn state (stack, interrupt, buffer,
/// writer) is threaded separately since those are scoped to one turn.
pub struct EngineServices {
    pub chat_store: Arc<dyn ChatStore>,
    pub assistants: Arc<dyn AssistantRegistry>,
    pub connectors: Arc<dyn ConnectorRegistry>,
    pub mcp_clients: Arc<dyn McpClientResolver>,
    pub hook_sandbox: Option<Arc<dyn HookSandbox>>,
}

/// Per-turn resources, created by the entry layer and released after the
/// root frame completes.
pub struct TurnResources {
    pub stack: Arc<StackRegistry>,
    pub interrupt: Arc<InterruptController>,
    pub trace: Arc<TraceRecorder>,
    pub writer: StreamWriter,
}

/// Entry point: drives one turn (or a delegated sub-turn) through all
/// fifteen phases. Boxed to allow delegation to recurse (§4.8).
pub fn stream<'a>(
    services: &'a EngineServices,
    resources: &'a TurnResources,
    ctx: &'a TurnContext,
    request: StreamRequest,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, EngineError>> + Send + 'a>> {
    Box::pin(stream_inner(services, resources, ctx, request))
}

async fn stream_inner(
    services: &EngineServices,
    resources: &TurnResources,
    ctx: &TurnContext,
    request: StreamRequest,
) -> Result<Response, EngineError> {
    // Phase 1: permission check.
    if !ctx.authorized {
        return Err(EngineError::Unauthorized);
    }

    let assistant = services
        .assistants
        .get(&request.assistant_id)
        .await
        .ok_or_else(|| EngineError::AssistantNotFound(request.assistant_id.clone()))?;

    let frame_options = request
        .options_override
        .clone()
        .unwrap_or_else(|| assistant.options.clone());

    // Phase 2: frame push; unconditional pop on exit via the guard's Drop.
    let guard = resources.stack.push(
        assistant.id.clone(),
        request.parent_frame_id.as_deref(),
        request.referer.clone(),
        frame_options,
    )?;
    let frame = guard.frame();
    let is_root = frame.is_root();

    // Phase 3: buffer init, root only.
    let buffer = BufferedChat::new(ctx.chat_id.clone().unwrap_or_default(), ctx.request_id.clone());
    let flush_guard = if is_root {
        Some(FlushGuard::new(services.chat_store.as_ref(), &buffer))
    } else {
        None
    };

    let body_future = std::panic::AssertUnwindSafe(run_turn_body(
        services, resources, ctx, &request, &assistant, &frame, is_root, &buffer,
    ));
    let outcome = match futures::future::FutureExt::catch_unwind(body_future).await {
        Ok(outcome) => outcome,
        Err(panic_payload) => {
            if let Some(flush_guard) = &flush_guard {
                flush_guard.set_outcome("failed", Some("turn panicked".to_string()));
                let _ = flush_guard.flush().await;
            }
            std::panic::resume_unwind(panic_payload);
        }
    };

    if let Some(flush_guard) = &flush_guard {
        let status = match &outcome {
            Ok(_) if resources.interrupt.is_cancelled() => "interrupted",
            Ok(_) => "completed",
            Err(_) if resources.interrupt.is_cancelled() => "interrupted",
            Err(_) => "failed",
        };
        let error = outcome.as_ref().err().map(|e| e.to_string());
        flush_guard.set_outcome(status, error);
        flush_guard.flush().await?;
    }

    // Phase 15: root close. Delegated (non-root) frames never close the
    // writer; only the root emits stream_start/stream_end (§4.8, invariant 5).
    if is_root {
        let status = if outcome.is_ok() { "completed" } else { "error" };
        let usage = outcome.as_ref().ok().and_then(|r| r.usage);
        let error = outcome.as_ref().err().map(|e| e.to_string());
        resources.writer.stream_end(
            &turn_id(ctx),
            now_ms_placeholder(),
            0,
            status,
            error,
            usage,
            Value::Null,
        )?;
    }

    outcome
}

#[allow(clippy::too_many_arguments)]
async fn run_turn_body(
    services: &EngineServices,
    resources: &TurnResources,
    ctx: &TurnContext,
    request: &StreamRequest,
    assistant: &AssistantConfig,
    frame: &super::stack::StackFrame,
    is_root: bool,
    buffer: &BufferedChat,
) -> Result<Response, EngineError> {
    let cancel = resources.interrupt.cancellation_token();

    // Phase 4: capability prefetch.
    let connector = services
        .connectors
        .get(&assistant.connector_id)
        .ok_or_else(|| EngineError::ConnectorNotFound(assistant.connector_id.clone()))?;
    let setting = connector.setting();

    // Phase 5: stream_start, root only.
    if is_root {
        resources.writer.stream_start(
            &turn_id(ctx),
            now_ms_placeholder(),
            stream_event::event::AssistantInfo {
                id: assistant.id.clone(),
                kind: "assistant".to_string(),
                name: assistant.id.clone(),
                avatar: None,
                description: None,
            },
            serde_json::json!({"capabilities": setting.capabilities}),
        )?;
    }

    // Phase 6: ensure chat (skipped when skip.history or no chat id known).
    let chat_id = ctx.chat_id.clone().unwrap_or_default();
    if !ctx.skip_history && !chat_id.is_empty() {
        if services.chat_store.get_chat(&chat_id).await?.is_none() {
            services
                .chat_store
                .create_chat(super::ports::Chat {
                    chat_id: chat_id.clone(),
                    last_connector: Some(assistant.connector_id.clone()),
                    last_mode: None,
                    updated_at: None,
                })
                .await?;
        }
    }

    // Phase 7: history.
    let history_options = HistoryOptions {
        skip_history: ctx.skip_history,
        max_size: None,
    };
    let history = with_history(
        services.chat_store.as_ref(),
        &chat_id,
        request.input_messages.clone(),
        &history_options,
    )
    .await?;
    if is_root {
        for message in &history.clean_input {
            buffer.push_message(
                uuid::Uuid::new_v4().to_string(),
                message.role,
                BufferedMessageType::UserInput,
                serde_json::json!({"content": message.content.as_text()}),
                None,
                None,
            );
        }
    }

    // Phase 8: create hook.
    let context_options = request.options_override.clone().unwrap_or_default();
    let mut hook_options: Option<CompletionOptions> = None;
    let mut messages = history.full_messages.clone();
    if let Some(sandbox) = &services.hook_sandbox {
        let runner = HookRunner::new(sandbox.as_ref());
        let handle = resources.trace.start(TraceNodeKind::Hook, "hook_create");
        let (response, overrides) = runner.create(&messages, &context_options).await?;
        hook_options = overrides;
        if let Some(override_messages) = response.messages {
            messages = override_messages;
        }
        resources.trace.complete(handle, None);
        buffer.push_step(
            uuid::Uuid::new_v4().to_string(),
            assistant.id.clone(),
            frame.id.clone(),
            frame.depth,
            StepType::HookCreate,
            StepStatus::Completed,
            Value::Null,
            None,
            Value::Null,
            None,
        );
        if let Some(delegate) = response.delegate {
            return run_delegate(services, resources, ctx, delegate, frame).await;
        }
    }

    // Phase 9: build request (options merge + tool catalog).
    let merged_options = OptionsMerger::merge(&assistant.options, &context_options, hook_options.as_ref())?;
    let resolver = |server_id: &str| services.mcp_clients.resolve(server_id);
    let tools = ToolCatalog::build(&assistant.mcp_servers, resolver).await;

    // Phase 10: auto-search is out of scope (no search subsystem in this
    // engine); the phase is a documented no-op rather than unimplemented.

    // Phase 11: LLM stream.
    let writer = resources.writer.clone();
    let on_chunk = move |chunk: ConnectorChunk| {
        let _ = writer.content_delta(chunk.0);
    };
    let llm_handle = resources.trace.start(TraceNodeKind::Llm, "llm");
    let mut completion = match connector.stream(&messages, &merged_options, &cancel, &on_chunk).await {
        Ok(response) => response,
        Err(err) => {
            resources.trace.fail(llm_handle, err.to_string());
            return Err(err);
        }
    };
    resources.trace.complete(llm_handle, Some(serde_json::json!({"finish_reason": completion.finish_reason})));

    // Phase 12: tool loop.
    let mut retry_messages = messages.clone();
    let mut retries_exhausted = false;
    for attempt in 0..MAX_TOOL_RETRIES {
        if completion.tool_calls.is_empty() {
            break;
        }
        let calls: Vec<(ToolCall, Value)> = completion
            .tool_calls
            .iter()
            .map(|tc| {
                let args: Value = serde_json::from_str(&tc.function.arguments)
                    .unwrap_or(Value::Object(Default::default()));
                (tc.clone(), args)
            })
            .collect();
        let executor_resolver = |server_id: &str| services.mcp_clients.resolve(server_id);
        let executor = ToolExecutor::new(&executor_resolver, &resources.trace);
        let results = executor.execute(&calls, &cancel).await;

        for result in &results {
            resources.writer.set_phase(result.tool_call_id.clone());
            let _ = resources.writer.tool_start(
                result.tool_call_id.clone(),
                result.server.clone(),
                result.tool.clone(),
                Value::Null,
            );
            if let Some(err) = &result.error {
                let _ = resources.writer.tool_fail(
                    result.tool_call_id.clone(),
                    result.server.clone(),
                    result.tool.clone(),
                    err.clone(),
                );
            } else {
                let _ = resources.writer.tool_complete(
                    result.tool_call_id.clone(),
                    result.server.clone(),
                    result.tool.clone(),
                    Value::String(result.content.clone()),
                );
            }
            let status = if result.error.is_some() {
                StepStatus::Failed
            } else {
                StepStatus::Completed
            };
            buffer.push_step(
                uuid::Uuid::new_v4().to_string(),
                assistant.id.clone(),
                frame.id.clone(),
                frame.depth,
                StepType::Tool,
                status,
                serde_json::json!({"tool": result.name}),
                Some(serde_json::json!({"content": result.content})),
                Value::Null,
                result.error.clone(),
            );
        }

        if !any_failed(&results) {
            break;
        }
        if all_non_retryable(&results) {
            return Err(EngineError::ToolNonRetryable(
                results
                    .iter()
                    .filter_map(|r| r.error.clone())
                    .collect::<Vec<_>>()
                    .join("; "),
            ));
        }

        retry_messages.push(Message::assistant_with_tool_calls(completion.tool_calls.clone()));
        for result in &results {
            retry_messages.push(Message::tool(result.tool_call_id.clone(), result.content.clone()));
        }
        retry_messages.push(Message::system(
            "One or more tool calls failed; correct the arguments and try again.",
        ));

        let writer = resources.writer.clone();
        let on_chunk = move |chunk: ConnectorChunk| {
            let _ = writer.content_delta(chunk.0);
        };
        completion = connector
            .stream(&retry_messages, &merged_options, &cancel, &on_chunk)
            .await?;
        if completion.tool_calls.is_empty() && any_failed(&results) {
            return Err(EngineError::LlmNoToolCallsOnRetry);
        }
        if attempt == MAX_TOOL_RETRIES - 1 {
            retries_exhausted = true;
        }
    }
    if retries_exhausted {
        return Err(EngineError::ToolRetryExhausted);
    }

    // Phase 13: next hook.
    let mut data = None;
    if let Some(sandbox) = &services.hook_sandbox {
        let runner = HookRunner::new(sandbox.as_ref());
        let payload = NextHookPayload {
            messages: retry_messages.clone(),
            completion: serde_json::json!({"content": completion.content}),
            tools: tools.clone(),
        };
        let (response, _overrides) = runner.next(&payload, &merged_options).await?;
        buffer.push_step(
            uuid::Uuid::new_v4().to_string(),
            assistant.id.clone(),
            frame.id.clone(),
            frame.depth,
            StepType::HookNext,
            StepStatus::Completed,
            Value::Null,
            None,
            Value::Null,
            None,
        );
        if let Some(delegate) = response.delegate {
            return run_delegate(services, resources, ctx, delegate, frame).await;
        }
        data = response.data;
    }

    if is_root {
        buffer.push_message(
            uuid::Uuid::new_v4().to_string(),
            Role::Assistant,
            BufferedMessageType::Text,
            serde_json::json!({"content": completion.content}),
            None,
            Some(assistant.id.clone()),
        );
    }

    // Phase 14: completion trace.
    if let Some(usage) = completion.usage {
        let _ = resources.writer.usage(usage);
    }
    let completion_handle = resources.trace.start(
        TraceNodeKind::Completion,
        format!("completion:{}", assistant.id),
    );
    resources.trace.complete(completion_handle, None);

    Ok(Response {
        content: completion.content,
        tool_calls: completion.tool_calls,
        usage: completion.usage,
        data,
    })
}

async fn run_delegate(
    services: &EngineServices,
    resources: &TurnResources,
    ctx: &TurnContext,
    delegate: super::hook::Delegate,
    parent_frame: &super::stack::StackFrame,
) -> Result<Response, EngineError> {
    let request = DelegateRequest {
        agent_id: delegate.agent_id,
        messages: delegate.messages,
        options: delegate.options,
    };
    let _target = resolve_delegate_target(services.assistants.as_ref(), &request).await?;
    let sub_request = StreamRequest {
        assistant_id: request.agent_id,
        input_messages: request.messages,
        options_override: request.options,
        parent_frame_id: Some(parent_frame.id.clone()),
        referer: Some("delegate".to_string()),
    };
    stream(services, resources, ctx, sub_request).await
}

fn turn_id(ctx: &TurnContext) -> TurnId {
    TurnId {
        context_id: ctx.context_id.clone(),
        chat_id: ctx.chat_id.clone(),
        request_id: ctx.request_id.clone(),
        trace_id: ctx.trace_id.clone(),
    }
}

/// Wall-clock timestamps are supplied by the caller's clock in a full
/// deployment; this engine core treats time as an injected concern and does
/// not call `SystemTime::now()` directly, so delegation/testing stays
/// deterministic. Embedding applications should pass real timestamps
/// through their own `StreamWriter` wrapper if wall-clock values are needed
/// on the wire.
fn now_ms_placeholder() -> i64 {
    0
}
