//! The pushdown stack backing rollback and nested stage execution.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::PipelineState;

/// One frame on the PDA stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    /// The state this frame represents.
    pub state: PipelineState,
    /// Context captured when the frame was pushed.
    pub context: HashMap<String, serde_json::Value>,
    /// When the frame was pushed (ISO 8601).
    pub timestamp: String,
}

impl Frame {
    /// Builds a new frame, stamping the current time.
    #[must_use]
    pub fn new(state: PipelineState, context: HashMap<String, serde_json::Value>) -> Self {
        Self {
            state,
            context,
            timestamp: crate::utils::iso_timestamp(),
        }
    }
}

/// The PDA stack itself: a first-class structure, never reconstructed
/// from transition history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stack {
    frames: Vec<Frame>,
}

impl Stack {
    /// Creates an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a new frame.
    pub fn push(&mut self, state: PipelineState, context: HashMap<String, serde_json::Value>) {
        self.frames.push(Frame::new(state, context));
    }

    /// Pops the top frame, if any.
    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// Returns the top frame without removing it.
    #[must_use]
    pub fn peek(&self) -> Option<&Frame> {
        self.frames.last()
    }

    /// Pops frames in LIFO order until the top frame's state equals
    /// `target`.
    ///
    /// Returns `false`, leaving the stack unmodified, if `target` is not
    /// present anywhere on the stack.
    pub fn rollback_to_state(&mut self, target: PipelineState) -> bool {
        if !self.frames.iter().any(|f| f.state == target) {
            return false;
        }

        while let Some(frame) = self.frames.last() {
            if frame.state == target {
                break;
            }
            self.frames.pop();
        }

        true
    }

    /// Returns the number of frames currently on the stack.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns true if the stack has no frames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop() {
        let mut stack = Stack::new();
        stack.push(PipelineState::Running, HashMap::new());
        assert_eq!(stack.len(), 1);

        let frame = stack.pop().unwrap();
        assert_eq!(frame.state, PipelineState::Running);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_pop_empty_returns_none() {
        let mut stack = Stack::new();
        assert!(stack.pop().is_none());
    }

    #[test]
    fn test_peek_does_not_mutate() {
        let mut stack = Stack::new();
        stack.push(PipelineState::Running, HashMap::new());
        assert_eq!(stack.peek().unwrap().state, PipelineState::Running);
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_rollback_to_state() {
        let mut stack = Stack::new();
        stack.push(PipelineState::Running, HashMap::new());
        stack.push(PipelineState::StageRunning, HashMap::new());
        stack.push(PipelineState::Recovering, HashMap::new());

        assert!(stack.rollback_to_state(PipelineState::Running));
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.peek().unwrap().state, PipelineState::Running);
    }

    #[test]
    fn test_rollback_to_missing_state_fails() {
        let mut stack = Stack::new();
        stack.push(PipelineState::Running, HashMap::new());

        assert!(!stack.rollback_to_state(PipelineState::Completed));
        assert_eq!(stack.len(), 1);
    }
}
