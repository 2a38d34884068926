//! Deterministic stand-ins for externally supplied, LLM-backed stage
//! bodies, so the orchestrator/supervisor/state-machine core can be
//! exercised without any real model or board backend.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::card::Card;
use crate::context::Context;
use crate::stage::{Stage, StageResult};

/// A stage that replays a fixed sequence of results, one per call,
/// repeating the last result once the script is exhausted.
#[derive(Debug)]
pub struct ScriptedStage {
    name: String,
    script: Vec<StageResult>,
    call_count: AtomicU32,
}

impl ScriptedStage {
    /// Creates a stage named `name` that replays `script` in order.
    #[must_use]
    pub fn new(name: impl Into<String>, script: Vec<StageResult>) -> Self {
        Self {
            name: name.into(),
            script,
            call_count: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl Stage for ScriptedStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _card: &Card, _context: &Context) -> StageResult {
        let call = self.call_count.fetch_add(1, Ordering::SeqCst) as usize;
        let idx = call.min(self.script.len().saturating_sub(1));
        self.script
            .get(idx)
            .cloned()
            .unwrap_or_else(StageResult::complete_empty)
    }
}

/// A stage that always fails with a fixed reason.
#[derive(Debug)]
pub struct AlwaysFailStage {
    name: String,
    reason: String,
}

impl AlwaysFailStage {
    /// Creates a stage named `name` that always fails with `reason`.
    #[must_use]
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Stage for AlwaysFailStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _card: &Card, _context: &Context) -> StageResult {
        StageResult::fail(self.reason.clone())
    }
}

/// A stage that sleeps before completing, used to exercise the
/// supervisor's timeout handling.
#[derive(Debug)]
pub struct SlowStage {
    name: String,
    delay: std::time::Duration,
}

impl SlowStage {
    /// Creates a stage named `name` that sleeps for `delay` before
    /// completing successfully.
    #[must_use]
    pub fn new(name: impl Into<String>, delay: std::time::Duration) -> Self {
        Self {
            name: name.into(),
            delay,
        }
    }
}

#[async_trait]
impl Stage for SlowStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _card: &Card, _context: &Context) -> StageResult {
        tokio::time::sleep(self.delay).await;
        StageResult::complete_empty()
    }
}

/// A stage that counts how many times it has been called, completing
/// every time. Useful for asserting retry counts.
#[derive(Debug, Default)]
pub struct CountingStage {
    name: String,
    count: AtomicU32,
}

impl CountingStage {
    /// Creates a stage named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            count: AtomicU32::new(0),
        }
    }

    /// Returns the number of times `execute` has been called.
    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Stage for CountingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, _card: &Card, _context: &Context) -> StageResult {
        self.count.fetch_add(1, Ordering::SeqCst);
        StageResult::complete_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_stage_replays_in_order() {
        let stage = ScriptedStage::new(
            "code_review",
            vec![StageResult::fail("issues found"), StageResult::complete_empty()],
        );
        let card = Card::new("c1", "t", crate::card::Priority::Low);
        let context = Context::new();

        let first = stage.execute(&card, &context).await;
        assert!(!first.is_success());
        let second = stage.execute(&card, &context).await;
        assert!(second.is_success());
    }

    #[tokio::test]
    async fn test_always_fail_stage() {
        let stage = AlwaysFailStage::new("validation", "always broken");
        let card = Card::new("c1", "t", crate::card::Priority::Low);
        let context = Context::new();
        let result = stage.execute(&card, &context).await;
        assert!(!result.is_success());
    }

    #[tokio::test]
    async fn test_counting_stage_counts_calls() {
        let stage = CountingStage::new("testing");
        let card = Card::new("c1", "t", crate::card::Priority::Low);
        let context = Context::new();
        stage.execute(&card, &context).await;
        stage.execute(&card, &context).await;
        assert_eq!(stage.call_count(), 2);
    }
}
