//! StackFrame / StackRegistry: cooperative call stack for nested (delegated)
//! assistant invocations (§3, §4.8, §9 cyclic-risk note).

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::error::EngineError;
use super::options::CompletionOptions;

/// Maximum nesting depth a delegation chain may reach before the engine
/// refuses to push another frame.
pub const MAX_STACK_DEPTH: u32 = 8;

/// One nesting level within a turn. Frames reference their parent by id
/// rather than by direct pointer — a parent frame can be popped and dropped
/// while a child still holds only its id, never a pointer that could
/// outlive it.
#[derive(Clone, Debug)]
pub struct StackFrame {
    pub id: String,
    pub assistant_id: String,
    pub parent_id: Option<String>,
    pub depth: u32,
    pub referer: Option<String>,
    pub options: CompletionOptions,
}

impl StackFrame {
    pub fn is_root(&self) -> bool {
        self.depth == 0
    }
}

/// Registry of live stack frames, keyed by id. Push/pop are paired via a
/// scoped guard so a frame is always removed on exit, including panics.
pub struct StackRegistry {
    frames: DashMap<String, StackFrame>,
    next_id: AtomicU64,
}

impl Default for StackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StackRegistry {
    pub fn new() -> Self {
        Self {
            frames: DashMap::new(),
            next_id: AtomicU64::new(0),
        }
    }

    /// Pushes a new frame under `parent_id` (root when `None`). Fails with
    /// [`EngineError::DelegationTooDeep`] once depth would exceed
    /// [`MAX_STACK_DEPTH`].
    pub fn push(
        self: &Arc<Self>,
        assistant_id: impl Into<String>,
        parent_id: Option<&str>,
        referer: Option<String>,
        options: CompletionOptions,
    ) -> Result<StackFrameGuard, EngineError> {
        let depth = match parent_id {
            None => 0,
            Some(pid) => {
                let parent = self
                    .frames
                    .get(pid)
                    .ok_or_else(|| EngineError::AssistantNotFound(pid.to_string()))?;
                parent.depth + 1
            }
        };
        if depth > MAX_STACK_DEPTH {
            return Err(EngineError::DelegationTooDeep(MAX_STACK_DEPTH));
        }
        let id = format!("frame-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let frame = StackFrame {
            id: id.clone(),
            assistant_id: assistant_id.into(),
            parent_id: parent_id.map(String::from),
            depth,
            referer,
            options,
        };
        self.frames.insert(id.clone(), frame);
        Ok(StackFrameGuard {
            registry: self.clone(),
            id,
        })
    }

    pub fn get(&self, id: &str) -> Option<StackFrame> {
        self.frames.get(id).map(|f| f.clone())
    }

    fn pop(&self, id: &str) {
        self.frames.remove(id);
    }
}

/// RAII guard: removes its frame from the registry on drop, guaranteeing
/// pop on every exit path (success, error, or panic unwind).
pub struct StackFrameGuard {
    registry: Arc<StackRegistry>,
    id: String,
}

impl StackFrameGuard {
    pub fn frame(&self) -> StackFrame {
        self.registry
            .get(&self.id)
            .expect("frame removed while guard alive")
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for StackFrameGuard {
    fn drop(&mut self) {
        self.registry.pop(&self.id);
    }
}
