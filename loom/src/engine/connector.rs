//! Connector implementations: an in-repo [`MockConnector`] for tests, and a
//! feature-gated `OpenAiConnector` ambient implementation matching the
//! teacher's `async-openai`-based `ChatOpenAI` client (§6, out-of-scope list
//! in §1 — real per-provider connectors beyond these two are not built here).

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::capabilities::Capabilities;
use super::error::EngineError;
use super::message::{Message, MessageContent, ToolCall};
use super::options::CompletionOptions;
use super::ports::{CompletionResponse, Connector, ConnectorChunk, ConnectorSetting, LlmUsage};

/// Deterministic test double: echoes the last user message back as content,
/// optionally returning a fixed set of tool calls instead.
pub struct MockConnector {
    id: String,
    setting: ConnectorSetting,
    tool_calls: Vec<ToolCall>,
}

impl MockConnector {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            setting: ConnectorSetting {
                capabilities: Capabilities {
                    streaming: true,
                    tool_calls: true,
                    ..Default::default()
                },
            },
            tool_calls: Vec::new(),
        }
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }
}

#[async_trait]
impl Connector for MockConnector {
    fn id(&self) -> &str {
        &self.id
    }

    fn setting(&self) -> ConnectorSetting {
        self.setting.clone()
    }

    async fn stream(
        &self,
        messages: &[Message],
        _options: &CompletionOptions,
        cancel: &CancellationToken,
        on_chunk: &(dyn Fn(ConnectorChunk) + Send + Sync),
    ) -> Result<CompletionResponse, EngineError> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        if !self.tool_calls.is_empty() {
            on_chunk(ConnectorChunk(serde_json::json!({"tool_calls": true})));
            return Ok(CompletionResponse {
                content: String::new(),
                tool_calls: self.tool_calls.clone(),
                usage: Some(LlmUsage {
                    prompt_tokens: 1,
                    completion_tokens: 1,
                    total_tokens: 2,
                }),
                finish_reason: Some("tool_calls".to_string()),
            });
        }
        let last_text = messages
            .iter()
            .rev()
            .find_map(|m| match &m.content {
                MessageContent::Text(text) => Some(text.clone()),
                MessageContent::Parts(_) => None,
            })
            .unwrap_or_default();
        on_chunk(ConnectorChunk(serde_json::json!({"delta": last_text})));
        Ok(CompletionResponse {
            content: last_text,
            tool_calls: vec![],
            usage: Some(LlmUsage {
                prompt_tokens: 1,
                completion_tokens: 1,
                total_tokens: 2,
            }),
            finish_reason: Some("stop".to_string()),
        })
    }
}

#[cfg(feature = "openai-connector")]
mod openai {
    use super::*;
    use async_openai::config::OpenAIConfig;
    use async_openai::types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    };
    use async_openai::Client;
    use futures::StreamExt;

    /// Ambient connector backed by `async-openai`'s streaming chat API,
    /// matching the teacher's `ChatOpenAI` usage pattern.
    pub struct OpenAiConnector {
        client: Client<OpenAIConfig>,
        model: String,
        setting: ConnectorSetting,
    }

    impl OpenAiConnector {
        pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
            let config = OpenAIConfig::new().with_api_key(api_key.into());
            Self {
                client: Client::with_config(config),
                model: model.into(),
                setting: ConnectorSetting {
                    capabilities: Capabilities {
                        streaming: true,
                        tool_calls: true,
                        vision: None,
                        ..Default::default()
                    },
                },
            }
        }

        fn to_openai_messages(messages: &[Message]) -> Vec<ChatCompletionRequestMessage> {
            messages
                .iter()
                .filter_map(|m| {
                    let text = match &m.content {
                        MessageContent::Text(text) => text.clone(),
                        MessageContent::Parts(_) => return None,
                    };
                    match m.role {
                        super::super::message::Role::User => {
                            ChatCompletionRequestUserMessageArgs::default()
                                .content(text)
                                .build()
                                .ok()
                                .map(Into::into)
                        }
                        super::super::message::Role::System => {
                            ChatCompletionRequestSystemMessageArgs::default()
                                .content(text)
                                .build()
                                .ok()
                                .map(Into::into)
                        }
                        _ => None,
                    }
                })
                .collect()
        }
    }

    #[async_trait]
    impl Connector for OpenAiConnector {
        fn id(&self) -> &str {
            "openai"
        }

        fn setting(&self) -> ConnectorSetting {
            self.setting.clone()
        }

        async fn stream(
            &self,
            messages: &[Message],
            options: &CompletionOptions,
            cancel: &CancellationToken,
            on_chunk: &(dyn Fn(ConnectorChunk) + Send + Sync),
        ) -> Result<CompletionResponse, EngineError> {
            let mut builder = CreateChatCompletionRequestArgs::default();
            builder.model(&self.model).messages(Self::to_openai_messages(messages));
            if let Some(temperature) = options.temperature {
                builder.temperature(temperature as f32);
            }
            if let Some(max_tokens) = options.max_tokens {
                builder.max_tokens(max_tokens as u32);
            }
            let request = builder
                .build()
                .map_err(|e| EngineError::LlmError(e.to_string()))?;

            let mut stream = self
                .client
                .chat()
                .create_stream(request)
                .await
                .map_err(|e| EngineError::LlmError(e.to_string()))?;

            let mut content = String::new();
            let mut usage = None;
            while let Some(next) = stream.next().await {
                if cancel.is_cancelled() {
                    return Err(EngineError::Cancelled);
                }
                let chunk = next.map_err(|e| EngineError::LlmError(e.to_string()))?;
                if let Some(choice) = chunk.choices.first() {
                    if let Some(delta) = &choice.delta.content {
                        content.push_str(delta);
                        on_chunk(ConnectorChunk(serde_json::json!({"delta": delta})));
                    }
                }
                if let Some(u) = chunk.usage {
                    usage = Some(LlmUsage {
                        prompt_tokens: u.prompt_tokens,
                        completion_tokens: u.completion_tokens,
                        total_tokens: u.total_tokens,
                    });
                }
            }

            Ok(CompletionResponse {
                content,
                tool_calls: vec![],
                usage,
                finish_reason: Some("stop".to_string()),
            })
        }
    }
}

#[cfg(feature = "openai-connector")]
pub use openai::OpenAiConnector;
