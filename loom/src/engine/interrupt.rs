//! InterruptController: per-context graceful/force signal queue (§4.7, §9).

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

use super::error::EngineError;
use super::message::Message;

/// Kind of an interrupt signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterruptKind {
    /// Delivered at the next checkpoint; does not cancel in-flight I/O.
    Graceful,
    /// Cancels the context's token immediately, in addition to enqueueing.
    Force,
}

/// One interrupt signal (§3).
#[derive(Clone, Debug)]
pub struct InterruptSignal {
    pub kind: InterruptKind,
    pub messages: Vec<Message>,
    pub timestamp: i64,
}

struct State {
    released: bool,
    queue: VecDeque<InterruptSignal>,
    current: Option<InterruptSignal>,
}

/// Per-context interrupt controller: a cancellation token, a "current"
/// signal, and a queue of pending signals. `graceful` signals are only
/// observed at phase boundaries; `force` also cancels the token so every
/// blocking call observing it aborts promptly.
pub struct InterruptController {
    token: CancellationToken,
    state: Mutex<State>,
}

impl Default for InterruptController {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptController {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            state: Mutex::new(State {
                released: false,
                queue: VecDeque::new(),
                current: None,
            }),
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Enqueues a signal; a `force` signal also cancels the token
    /// immediately. Returns [`EngineError::InterruptTargetNotFound`] if the
    /// context has already been released.
    pub fn send(&self, signal: InterruptSignal) -> Result<(), EngineError> {
        let mut state = self.state.lock().expect("interrupt state poisoned");
        if state.released {
            return Err(EngineError::InterruptTargetNotFound);
        }
        if signal.kind == InterruptKind::Force {
            self.token.cancel();
        }
        state.queue.push_back(signal);
        Ok(())
    }

    /// Called at a phase boundary: pops and records the next pending signal,
    /// if any, as "current".
    pub fn check_checkpoint(&self) -> Option<InterruptSignal> {
        let mut state = self.state.lock().expect("interrupt state poisoned");
        let next = state.queue.pop_front();
        if let Some(ref signal) = next {
            state.current = Some(signal.clone());
        }
        next
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn current(&self) -> Option<InterruptSignal> {
        self.state.lock().expect("interrupt state poisoned").current.clone()
    }

    /// Marks the context released; subsequent `send` calls return `NotFound`.
    pub fn release(&self) {
        self.state.lock().expect("interrupt state poisoned").released = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(kind: InterruptKind) -> InterruptSignal {
        InterruptSignal {
            kind,
            messages: vec![],
            timestamp: 0,
        }
    }

    #[test]
    fn graceful_signal_does_not_cancel_token() {
        let controller = InterruptController::new();
        controller.send(signal(InterruptKind::Graceful)).unwrap();
        assert!(!controller.is_cancelled());
        assert!(controller.check_checkpoint().is_some());
    }

    #[test]
    fn force_signal_cancels_token_immediately() {
        let controller = InterruptController::new();
        controller.send(signal(InterruptKind::Force)).unwrap();
        assert!(controller.is_cancelled());
    }

    /// **Scenario**: a signal queued before `Stream` begins is observed at
    /// the first checkpoint the engine reaches.
    #[test]
    fn queued_signal_observed_at_first_checkpoint() {
        let controller = InterruptController::new();
        controller.send(signal(InterruptKind::Graceful)).unwrap();
        let observed = controller.check_checkpoint();
        assert!(observed.is_some());
        assert!(controller.current().is_some());
    }

    #[test]
    fn send_to_released_context_returns_not_found() {
        let controller = InterruptController::new();
        controller.release();
        let err = controller.send(signal(InterruptKind::Graceful)).unwrap_err();
        assert!(matches!(err, EngineError::InterruptTargetNotFound));
    }
}
