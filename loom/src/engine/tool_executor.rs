//! ToolExecutor: dispatches tool calls single/parallel with retry
//! classification (§4.5).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::error::{classify_tool_error, EngineError, Retryable};
use super::mcp_catalog::parse_tool_name;
use super::message::ToolCall;
use super::ports::McpClient;
use super::trace::{TraceNodeKind, TraceRecorder};

/// Outcome of one resolved tool call (`ToolCallResult` §3).
#[derive(Clone, Debug)]
pub struct ToolCallResult {
    pub tool_call_id: String,
    pub name: String,
    pub content: String,
    pub error: Option<String>,
    pub is_retryable: bool,
    pub server: String,
    pub tool: String,
}

impl ToolCallResult {
    fn ok(tool_call_id: String, name: String, server: String, tool: String, content: String) -> Self {
        Self {
            tool_call_id,
            name,
            content,
            error: None,
            is_retryable: false,
            server,
            tool,
        }
    }

    fn err(
        tool_call_id: String,
        name: String,
        server: String,
        tool: String,
        message: String,
    ) -> Self {
        let retryable = classify_tool_error(&message) == Retryable::Yes;
        Self {
            tool_call_id,
            name,
            content: message.clone(),
            error: Some(message),
            is_retryable: retryable,
            server,
            tool,
        }
    }
}

/// Resolves a client for a given MCP server id; returns `None` when the
/// server isn't configured or has no live client.
pub type ClientResolver<'a> = dyn Fn(&str) -> Option<Arc<dyn McpClient>> + Send + Sync + 'a;

/// Executes tool calls per §4.5: single calls direct, multiple calls grouped
/// by server and attempted as a batch with sequential fallback on retryable
/// batch failures.
pub struct ToolExecutor<'a> {
    resolve_client: &'a ClientResolver<'a>,
    trace: &'a TraceRecorder,
}

impl<'a> ToolExecutor<'a> {
    pub fn new(resolve_client: &'a ClientResolver<'a>, trace: &'a TraceRecorder) -> Self {
        Self {
            resolve_client,
            trace,
        }
    }

    /// Executes all calls, grouped by server, in original tool-call order
    /// within each server's group. Cross-server ordering is unspecified.
    pub async fn execute(
        &self,
        calls: &[(ToolCall, Value)],
        cancel: &CancellationToken,
    ) -> Vec<ToolCallResult> {
        let mut by_server: HashMap<String, Vec<(ToolCall, Value)>> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        for (call, args) in calls {
            let server = match parse_tool_name(&call.function.name) {
                Ok((server, _)) => server,
                Err(_) => {
                    // Unparseable name: fails immediately as a non-retryable
                    // argument error, no server dispatch possible.
                    continue;
                }
            };
            if !by_server.contains_key(&server) {
                order.push(server.clone());
            }
            by_server.entry(server).or_default().push((call.clone(), args.clone()));
        }

        let mut results = Vec::with_capacity(calls.len());
        for (call, _) in calls {
            if parse_tool_name(&call.function.name).is_err() {
                results.push(ToolCallResult::err(
                    call.id.clone(),
                    call.function.name.clone(),
                    String::new(),
                    String::new(),
                    "invalid tool name format".to_string(),
                ));
            }
        }

        for server in order {
            let group = by_server.remove(&server).unwrap_or_default();
            let mut group_results = if group.len() == 1 {
                let (call, args) = &group[0];
                vec![self.call_single(&server, call, args, cancel).await]
            } else {
                self.call_group(&server, &group, cancel).await
            };
            results.append(&mut group_results);
        }

        results
    }

    async fn call_single(
        &self,
        server: &str,
        call: &ToolCall,
        args: &Value,
        cancel: &CancellationToken,
    ) -> ToolCallResult {
        let (_, tool) = match parse_tool_name(&call.function.name) {
            Ok(parts) => parts,
            Err(_) => {
                return ToolCallResult::err(
                    call.id.clone(),
                    call.function.name.clone(),
                    server.to_string(),
                    String::new(),
                    "invalid tool name format".to_string(),
                )
            }
        };
        let handle = self.trace.start(TraceNodeKind::McpTool, call.function.name.clone());
        let Some(client) = (self.resolve_client)(server) else {
            let message = format!("no client available for server {server}");
            self.trace.fail(handle, message.clone());
            return ToolCallResult::err(call.id.clone(), call.function.name.clone(), server.to_string(), tool, message);
        };
        match client.call_tool(&tool, args, cancel).await {
            Ok(outcome) if !outcome.is_error => {
                self.trace.complete(handle, Some(serde_json::json!({"content": outcome.content})));
                ToolCallResult::ok(
                    call.id.clone(),
                    call.function.name.clone(),
                    server.to_string(),
                    tool,
                    outcome.content,
                )
            }
            Ok(outcome) => {
                self.trace.fail(handle, outcome.content.clone());
                ToolCallResult::err(call.id.clone(), call.function.name.clone(), server.to_string(), tool, outcome.content)
            }
            Err(err) => {
                self.trace.fail(handle, err.to_string());
                ToolCallResult::err(call.id.clone(), call.function.name.clone(), server.to_string(), tool, err.to_string())
            }
        }
    }

    async fn call_group(
        &self,
        server: &str,
        group: &[(ToolCall, Value)],
        cancel: &CancellationToken,
    ) -> Vec<ToolCallResult> {
        let handle = self.trace.start(TraceNodeKind::McpTool, format!("{server}:batch"));
        let Some(client) = (self.resolve_client)(server) else {
            let message = format!("no client available for server {server}");
            self.trace.fail(handle, message.clone());
            return group
                .iter()
                .map(|(call, _)| {
                    let tool = parse_tool_name(&call.function.name)
                        .map(|(_, t)| t)
                        .unwrap_or_default();
                    ToolCallResult::err(call.id.clone(), call.function.name.clone(), server.to_string(), tool, message.clone())
                })
                .collect();
        };

        match client.call_tools_parallel(group, cancel).await {
            Ok(outcomes) if outcomes.len() == group.len() => {
                let results: Vec<ToolCallResult> = group
                    .iter()
                    .zip(outcomes.iter())
                    .map(|((call, _), outcome)| {
                        let tool = parse_tool_name(&call.function.name)
                            .map(|(_, t)| t)
                            .unwrap_or_default();
                        if outcome.is_error {
                            ToolCallResult::err(
                                call.id.clone(),
                                call.function.name.clone(),
                                server.to_string(),
                                tool,
                                outcome.content.clone(),
                            )
                        } else {
                            ToolCallResult::ok(
                                call.id.clone(),
                                call.function.name.clone(),
                                server.to_string(),
                                tool,
                                outcome.content.clone(),
                            )
                        }
                    })
                    .collect();
                if results.iter().any(|r| r.error.is_some() && r.is_retryable) {
                    self.trace.fail(handle, "batch had retryable failures, falling back".to_string());
                    return self.call_sequential(server, group, cancel).await;
                }
                self.trace.complete(handle, None);
                results
            }
            _ => {
                warn!(server, "parallel tool batch failed, falling back to sequential calls");
                self.trace.fail(handle, "batch call failed".to_string());
                self.call_sequential(server, group, cancel).await
            }
        }
    }

    async fn call_sequential(
        &self,
        server: &str,
        group: &[(ToolCall, Value)],
        cancel: &CancellationToken,
    ) -> Vec<ToolCallResult> {
        let mut results = Vec::with_capacity(group.len());
        for (call, args) in group {
            results.push(self.call_single(server, call, args, cancel).await);
        }
        results
    }
}

/// Error propagated when a tool batch contains only non-retryable failures
/// (§4.1 phase 12c).
pub fn all_non_retryable(results: &[ToolCallResult]) -> bool {
    results.iter().any(|r| r.error.is_some()) && results.iter().filter(|r| r.error.is_some()).all(|r| !r.is_retryable)
}

pub fn any_failed(results: &[ToolCallResult]) -> bool {
    results.iter().any(|r| r.error.is_some())
}
