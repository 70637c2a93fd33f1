//! A minimal in-memory [`EngineServices`] wiring, used by the WebSocket server
//! when no embedding application supplies its own registries.
//!
//! This is demo plumbing, not a persistence layer: chats live only as long as
//! the process does. An embedding application is expected to supply its own
//! `ChatStore`/`AssistantRegistry`/`ConnectorRegistry` and build `EngineServices`
//! directly — see the crate-level doctest in `loom`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use loom::engine::{
    AssistantConfig, AssistantRegistry, Chat, ChatStore, CompletionOptions, Connector,
    ConnectorRegistry, EngineError, EngineServices, McpClient, McpClientResolver, Message,
    MessageFilter, MockConnector, ResumeRecord,
};

/// Chat/message storage kept in a process-local map. Good enough for the
/// demo server and for e2e tests; not durable across restarts.
#[derive(Default)]
pub struct InMemoryChatStore {
    chats: Mutex<HashMap<String, Chat>>,
    messages: Mutex<HashMap<String, Vec<Message>>>,
    resumes: Mutex<HashMap<String, ResumeRecord>>,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatStore for InMemoryChatStore {
    async fn get_chat(&self, chat_id: &str) -> Result<Option<Chat>, EngineError> {
        Ok(self.chats.lock().unwrap().get(chat_id).cloned())
    }

    async fn create_chat(&self, chat: Chat) -> Result<(), EngineError> {
        self.chats
            .lock()
            .unwrap()
            .insert(chat.chat_id.clone(), chat);
        Ok(())
    }

    async fn delete_chat(&self, chat_id: &str) -> Result<(), EngineError> {
        self.chats.lock().unwrap().remove(chat_id);
        self.messages.lock().unwrap().remove(chat_id);
        Ok(())
    }

    async fn get_messages(
        &self,
        chat_id: &str,
        filter: MessageFilter,
    ) -> Result<Vec<Message>, EngineError> {
        let messages = self.messages.lock().unwrap();
        let Some(stored) = messages.get(chat_id) else {
            return Ok(vec![]);
        };
        match filter.limit {
            Some(limit) if stored.len() > limit => {
                Ok(stored[stored.len() - limit..].to_vec())
            }
            _ => Ok(stored.clone()),
        }
    }

    async fn save_messages(&self, chat_id: &str, new_messages: &[Message]) -> Result<(), EngineError> {
        self.messages
            .lock()
            .unwrap()
            .entry(chat_id.to_string())
            .or_default()
            .extend_from_slice(new_messages);
        Ok(())
    }

    async fn delete_messages(
        &self,
        chat_id: &str,
        _filter: Option<MessageFilter>,
    ) -> Result<(), EngineError> {
        self.messages.lock().unwrap().remove(chat_id);
        Ok(())
    }

    async fn get_resume(&self, chat_id: &str) -> Result<Option<ResumeRecord>, EngineError> {
        Ok(self.resumes.lock().unwrap().get(chat_id).cloned())
    }

    async fn save_resume(&self, record: ResumeRecord) -> Result<(), EngineError> {
        self.resumes
            .lock()
            .unwrap()
            .insert(record.chat_id.clone(), record);
        Ok(())
    }

    async fn delete_resume(&self, chat_id: &str) -> Result<(), EngineError> {
        self.resumes.lock().unwrap().remove(chat_id);
        Ok(())
    }
}

/// A single fixed assistant, `"default"`, backed by [`MockConnector`] unless
/// the `openai-connector` feature is enabled and `OPENAI_MODEL` is set.
struct DefaultAssistant;

#[async_trait]
impl AssistantRegistry for DefaultAssistant {
    async fn get(&self, assistant_id: &str) -> Option<AssistantConfig> {
        (assistant_id == "default").then(|| AssistantConfig {
            id: "default".to_string(),
            connector_id: "default".to_string(),
            options: CompletionOptions::default(),
            mcp_servers: vec![],
        })
    }
}

struct SingleConnector(Arc<dyn Connector>);

impl ConnectorRegistry for SingleConnector {
    fn get(&self, _connector_id: &str) -> Option<Arc<dyn Connector>> {
        Some(self.0.clone())
    }
}

struct NoMcpServers;

impl McpClientResolver for NoMcpServers {
    fn resolve(&self, _server_id: &str) -> Option<Arc<dyn McpClient>> {
        None
    }
}

/// Builds the demo wiring: one in-memory chat store, one `"default"` assistant
/// talking to a [`MockConnector`], no MCP servers, no hook sandbox.
pub fn build_demo_services() -> Arc<EngineServices> {
    Arc::new(EngineServices {
        chat_store: Arc::new(InMemoryChatStore::new()),
        assistants: Arc::new(DefaultAssistant),
        connectors: Arc::new(SingleConnector(Arc::new(MockConnector::new("default")))),
        mcp_clients: Arc::new(NoMcpServers),
        hook_sandbox: None,
    })
}
