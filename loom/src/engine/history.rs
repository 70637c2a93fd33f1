//! HistoryLoader: fetch prior messages and strip the overlap with new input
//! (§4.2).

use tracing::warn;

use super::error::EngineError;
use super::message::Message;
use super::ports::{ChatStore, MessageFilter};

pub const DEFAULT_MAX_SIZE: usize = 20;

/// Per-call knobs for [`with_history`].
#[derive(Clone, Debug, Default)]
pub struct HistoryOptions {
    pub skip_history: bool,
    pub max_size: Option<usize>,
}

/// Result of loading and merging history with new input.
#[derive(Clone, Debug)]
pub struct HistoryResult {
    /// `input` with any overlapping prefix (already present in history) stripped.
    pub clean_input: Vec<Message>,
    /// `history ++ clean_input`.
    pub full_messages: Vec<Message>,
}

/// UI-only message types that never carry conversational content and are
/// dropped before overlap detection (`props.type` on the stored record).
const UI_ONLY_TYPES: &[&str] = &["tool_call", "loading", "action", "event"];

/// Raw stored record shape used to decide which messages survive the
/// `user`/`assistant`-only, UI-type filter described in §4.2. `ChatStore`
/// returns already-decoded [`Message`]s; this type models the pre-filter
/// record when a store exposes the richer persisted shape (e.g. via
/// `props.type`). Stores that only ever persist conversational turns may
/// skip this and hand `get_messages` results straight to [`with_history`].
#[derive(Clone, Debug)]
pub struct StoredMessage {
    pub message: Message,
    pub kind: String,
}

/// Filters stored records to the subset usable as conversation history:
/// `user`/`assistant` roles only, UI-only `kind`s dropped, and messages with
/// no extractable content dropped.
pub fn filter_stored(records: Vec<StoredMessage>) -> Vec<Message> {
    records
        .into_iter()
        .filter(|r| !UI_ONLY_TYPES.contains(&r.kind.as_str()))
        .filter(|r| matches!(r.message.role, super::message::Role::User | super::message::Role::Assistant))
        .map(|r| r.message)
        .collect()
}

/// Finds the largest `k` such that `history[history.len()-k..]` deep-equals
/// `input[..k]` (same role and structurally equal content), per §4.2.
fn overlap_len(history: &[Message], input: &[Message]) -> usize {
    let max_k = history.len().min(input.len());
    for k in (1..=max_k).rev() {
        let hist_tail = &history[history.len() - k..];
        let input_head = &input[..k];
        if hist_tail == input_head {
            return k;
        }
    }
    0
}

/// `WithHistory(ctx, input, options) -> {clean_input, full_messages}` (§4.2).
///
/// Degrades gracefully (returns `{input, input}`, no error) when history is
/// skipped, the chat id is empty, or the store errors.
pub async fn with_history(
    store: &dyn ChatStore,
    chat_id: &str,
    input: Vec<Message>,
    options: &HistoryOptions,
) -> Result<HistoryResult, EngineError> {
    if options.skip_history || chat_id.is_empty() {
        return Ok(HistoryResult {
            clean_input: input.clone(),
            full_messages: input,
        });
    }

    let limit = options.max_size.unwrap_or(DEFAULT_MAX_SIZE);
    let history = match store
        .get_messages(chat_id, MessageFilter { limit: Some(limit) })
        .await
    {
        Ok(messages) => messages,
        Err(err) => {
            warn!(chat_id, error = %err, "history fetch failed, degrading to input-only");
            return Ok(HistoryResult {
                clean_input: input.clone(),
                full_messages: input,
            });
        }
    };

    let k = overlap_len(&history, &input);
    let clean_input = input[k..].to_vec();
    let mut full_messages = history;
    full_messages.extend(clean_input.clone());

    Ok(HistoryResult {
        clean_input,
        full_messages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::message::Message;
    use async_trait::async_trait;
    use serde_json::Value;

    struct FixedStore(Vec<Message>);

    #[async_trait]
    impl ChatStore for FixedStore {
        async fn get_chat(&self, _chat_id: &str) -> Result<Option<super::super::ports::Chat>, EngineError> {
            Ok(None)
        }
        async fn create_chat(&self, _chat: super::super::ports::Chat) -> Result<(), EngineError> {
            Ok(())
        }
        async fn delete_chat(&self, _chat_id: &str) -> Result<(), EngineError> {
            Ok(())
        }
        async fn get_messages(
            &self,
            _chat_id: &str,
            _filter: MessageFilter,
        ) -> Result<Vec<Message>, EngineError> {
            Ok(self.0.clone())
        }
        async fn save_messages(&self, _chat_id: &str, _messages: &[Message]) -> Result<(), EngineError> {
            Ok(())
        }
        async fn delete_messages(
            &self,
            _chat_id: &str,
            _filter: Option<MessageFilter>,
        ) -> Result<(), EngineError> {
            Ok(())
        }
        async fn get_resume(
            &self,
            _chat_id: &str,
        ) -> Result<Option<super::super::ports::ResumeRecord>, EngineError> {
            Ok(None)
        }
        async fn save_resume(&self, _record: super::super::ports::ResumeRecord) -> Result<(), EngineError> {
            Ok(())
        }
        async fn delete_resume(&self, _chat_id: &str) -> Result<(), EngineError> {
            Ok(())
        }
    }

    /// **Scenario**: overlap strip (§8 scenario 1).
    #[tokio::test]
    async fn overlap_strip_matches_literal_scenario() {
        let history = vec![Message::user("hi"), Message::assistant("hello")];
        let input = vec![Message::assistant("hello"), Message::user("what's new?")];
        let store = FixedStore(history);
        let result = with_history(&store, "chat-1", input, &HistoryOptions::default())
            .await
            .unwrap();
        assert_eq!(result.clean_input, vec![Message::user("what's new?")]);
        assert_eq!(result.full_messages.len(), 3);
    }

    #[tokio::test]
    async fn no_overlap_keeps_all_input() {
        let history = vec![Message::user("hi")];
        let input = vec![Message::user("totally different")];
        let store = FixedStore(history);
        let result = with_history(&store, "chat-1", input.clone(), &HistoryOptions::default())
            .await
            .unwrap();
        assert_eq!(result.clean_input, input);
        assert_eq!(result.full_messages.len(), 2);
    }

    #[tokio::test]
    async fn skip_history_returns_input_unchanged() {
        let store = FixedStore(vec![Message::user("hi")]);
        let input = vec![Message::user("new")];
        let opts = HistoryOptions {
            skip_history: true,
            max_size: None,
        };
        let result = with_history(&store, "chat-1", input.clone(), &opts).await.unwrap();
        assert_eq!(result.clean_input, input);
        assert_eq!(result.full_messages, result.clean_input);
    }

    #[tokio::test]
    async fn empty_chat_id_degrades_to_input_only() {
        let store = FixedStore(vec![Message::user("hi")]);
        let input = vec![Message::user("new")];
        let result = with_history(&store, "", input.clone(), &HistoryOptions::default())
            .await
            .unwrap();
        assert_eq!(result.full_messages, input);
    }

    #[test]
    fn filter_stored_drops_ui_only_and_non_chat_roles() {
        use crate::engine::message::Role;
        let records = vec![
            StoredMessage {
                message: Message::user("hello"),
                kind: "text".to_string(),
            },
            StoredMessage {
                message: Message {
                    role: Role::Tool,
                    content: crate::engine::message::MessageContent::Text("ok".into()),
                    name: None,
                    tool_call_id: Some("call-1".into()),
                    tool_calls: None,
                },
                kind: "tool_call".to_string(),
            },
        ];
        let _ = Value::Null;
        let filtered = filter_stored(records);
        assert_eq!(filtered.len(), 1);
    }
}
