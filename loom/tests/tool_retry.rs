//! Coverage of the tool retry loop's three outcomes: eventual success after
//! a retryable failure, a non-retryable failure short-circuiting the loop,
//! and attempts exhausting with the failure still retryable.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use loom::engine::{
    AssistantConfig, CompletionOptions, Connector, EngineError, McpServerConfig, Message,
    MockConnector, StreamRequest, ToolCall, ToolCallFunction, ToolCallOutcome,
};

use common::{ctx, resources, services_with, RecordingStore, ScriptedToolClient, StaticMcpServers};

fn tool_call() -> ToolCall {
    ToolCall {
        id: "call-1".to_string(),
        function: ToolCallFunction {
            name: "svc__lookup".to_string(),
            arguments: "{}".to_string(),
        },
    }
}

fn assistant_with_server() -> AssistantConfig {
    AssistantConfig {
        id: "root".to_string(),
        connector_id: "mock-1".to_string(),
        options: CompletionOptions::default(),
        mcp_servers: vec![McpServerConfig {
            server_id: "svc".to_string(),
            allow_list: None,
        }],
    }
}

fn connectors_with_tool_calls() -> HashMap<String, Arc<dyn Connector>> {
    let mut connectors: HashMap<String, Arc<dyn Connector>> = HashMap::new();
    connectors.insert(
        "mock-1".to_string(),
        Arc::new(MockConnector::new("mock-1").with_tool_calls(vec![tool_call()])),
    );
    connectors
}

#[tokio::test]
async fn tool_call_succeeding_after_one_retry_returns_ok() {
    let store: Arc<dyn loom::engine::ChatStore> = Arc::new(RecordingStore::default());
    let client = ScriptedToolClient::new(|attempt| {
        if attempt == 0 {
            ToolCallOutcome {
                content: "invalid argument: missing field".to_string(),
                is_error: true,
            }
        } else {
            ToolCallOutcome {
                content: "42".to_string(),
                is_error: false,
            }
        }
    });
    let mut clients: HashMap<String, Arc<dyn loom::engine::McpClient>> = HashMap::new();
    clients.insert("svc".to_string(), Arc::new(client));
    let services = services_with(
        store,
        vec![assistant_with_server()],
        connectors_with_tool_calls(),
        Arc::new(StaticMcpServers(clients)),
    );
    let resources = resources();
    let context = ctx("chat-1");
    let request = StreamRequest {
        assistant_id: "root".to_string(),
        input_messages: vec![Message::user("look it up")],
        options_override: None,
        parent_frame_id: None,
        referer: None,
    };
    let response = loom::stream(&services, &resources, &context, request).await.unwrap();
    assert_eq!(response.tool_calls.len(), 1);
}

#[tokio::test]
async fn non_retryable_tool_failure_fails_the_turn_immediately() {
    let store: Arc<dyn loom::engine::ChatStore> = Arc::new(RecordingStore::default());
    let client = ScriptedToolClient::new(|_attempt| ToolCallOutcome {
        content: "network unavailable".to_string(),
        is_error: true,
    });
    let mut clients: HashMap<String, Arc<dyn loom::engine::McpClient>> = HashMap::new();
    clients.insert("svc".to_string(), Arc::new(client));
    let services = services_with(
        store,
        vec![assistant_with_server()],
        connectors_with_tool_calls(),
        Arc::new(StaticMcpServers(clients)),
    );
    let resources = resources();
    let context = ctx("chat-1");
    let request = StreamRequest {
        assistant_id: "root".to_string(),
        input_messages: vec![Message::user("look it up")],
        options_override: None,
        parent_frame_id: None,
        referer: None,
    };
    let err = loom::stream(&services, &resources, &context, request).await.unwrap_err();
    assert!(matches!(err, EngineError::ToolNonRetryable(_)));
}

#[tokio::test]
async fn retryable_tool_failure_exhausting_all_attempts_fails_with_tool_retry_exhausted() {
    let store: Arc<dyn loom::engine::ChatStore> = Arc::new(RecordingStore::default());
    let client = ScriptedToolClient::new(|_attempt| ToolCallOutcome {
        content: "invalid argument: still wrong".to_string(),
        is_error: true,
    });
    let mut clients: HashMap<String, Arc<dyn loom::engine::McpClient>> = HashMap::new();
    clients.insert("svc".to_string(), Arc::new(client));
    let services = services_with(
        store,
        vec![assistant_with_server()],
        connectors_with_tool_calls(),
        Arc::new(StaticMcpServers(clients)),
    );
    let resources = resources();
    let context = ctx("chat-1");
    let request = StreamRequest {
        assistant_id: "root".to_string(),
        input_messages: vec![Message::user("look it up")],
        options_override: None,
        parent_frame_id: None,
        referer: None,
    };
    let err = loom::stream(&services, &resources, &context, request).await.unwrap_err();
    assert!(matches!(err, EngineError::ToolRetryExhausted));
}
