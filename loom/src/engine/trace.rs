//! TraceRecorder: append-only tree of typed nodes, purely observability (§2, §4.5).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde_json::Value;

/// Kind of one trace node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceNodeKind {
    Agent,
    Llm,
    McpTool,
    Hook,
    Completion,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceStatus {
    Running,
    Completed,
    Failed,
}

/// One node in the trace tree.
#[derive(Clone, Debug)]
pub struct TraceNode {
    pub id: u64,
    pub kind: TraceNodeKind,
    pub name: String,
    pub status: TraceStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
}

/// Append-only, internally serialised trace tree. Nodes are recorded flat
/// (indexed by id) rather than as a literal nested structure, which keeps
/// concurrent appends (e.g. parallel tool calls' completion traces) lock-step
/// simple: one mutex guarding a `Vec`.
#[derive(Default)]
pub struct TraceRecorder {
    nodes: Mutex<Vec<TraceNode>>,
    next_id: AtomicU64,
}

/// Handle to a running trace node, used to record its completion or failure.
#[derive(Clone, Copy, Debug)]
pub struct NodeHandle(u64);

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self, kind: TraceNodeKind, name: impl Into<String>) -> NodeHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let node = TraceNode {
            id,
            kind,
            name: name.into(),
            status: TraceStatus::Running,
            result: None,
            error: None,
        };
        self.nodes.lock().expect("trace lock poisoned").push(node);
        NodeHandle(id)
    }

    pub fn complete(&self, handle: NodeHandle, result: Option<Value>) {
        let mut nodes = self.nodes.lock().expect("trace lock poisoned");
        if let Some(node) = nodes.iter_mut().find(|n| n.id == handle.0) {
            node.status = TraceStatus::Completed;
            node.result = result;
        }
    }

    pub fn fail(&self, handle: NodeHandle, error: impl Into<String>) {
        let mut nodes = self.nodes.lock().expect("trace lock poisoned");
        if let Some(node) = nodes.iter_mut().find(|n| n.id == handle.0) {
            node.status = TraceStatus::Failed;
            node.error = Some(error.into());
        }
    }

    pub fn snapshot(&self) -> Vec<TraceNode> {
        self.nodes.lock().expect("trace lock poisoned").clone()
    }
}
