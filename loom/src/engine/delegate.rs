//! Delegation: hands a turn off to another assistant under a new stack frame
//! (§4.8).

use super::error::EngineError;
use super::message::Message;
use super::options::CompletionOptions;

/// A direct handoff requested by a hook response, re-entering the engine
/// under a new, deeper [`super::stack::StackFrame`].
#[derive(Clone, Debug)]
pub struct DelegateRequest {
    pub agent_id: String,
    pub messages: Vec<Message>,
    pub options: Option<CompletionOptions>,
}

/// Resolves an assistant id to its static configuration. The coordinator
/// calls this to load the delegate target before recursing into `Stream`;
/// a missing assistant is a fatal, non-retryable turn error.
#[async_trait::async_trait]
pub trait AssistantRegistry: Send + Sync {
    async fn get(&self, assistant_id: &str) -> Option<super::coordinator::AssistantConfig>;
}

/// Looks up the delegate target, failing with [`EngineError::AssistantNotFound`]
/// if it isn't registered.
pub async fn resolve_delegate_target(
    registry: &dyn AssistantRegistry,
    request: &DelegateRequest,
) -> Result<super::coordinator::AssistantConfig, EngineError> {
    registry
        .get(&request.agent_id)
        .await
        .ok_or_else(|| EngineError::AssistantNotFound(request.agent_id.clone()))
}
