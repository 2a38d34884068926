//! Optional hook letting an external advisor propose recovery plans.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A candidate recovery plan proposed for an observed failure event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowPlan {
    /// The issue type this plan addresses.
    pub issue_type: String,
    /// Ordered action names to attempt.
    pub actions: Vec<String>,
    /// The advisor's confidence in this plan, in `[0.0, 1.0]`.
    pub confidence: f64,
}

/// A description of a failure event handed to an advisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureEvent {
    /// The stage that failed.
    pub stage: String,
    /// The error kind, per `ArtemisError::kind`.
    pub error_kind: String,
    /// A human-readable failure message.
    pub message: String,
}

/// An external source of recovery suggestions, consulted by the
/// supervisor when the built-in recovery workflow table has no exact
/// match for an issue type.
///
/// This is a narrow seam: the supervisor never constructs an advisor
/// itself, callers inject one (or none) at startup.
#[async_trait]
pub trait LearningAdvisor: Send + Sync {
    /// Proposes a workflow plan for the given failure event.
    async fn propose(&self, event: &FailureEvent) -> Option<WorkflowPlan>;
}

/// An advisor that never proposes anything, the default when no
/// learning backend is configured.
#[derive(Debug, Default)]
pub struct NoOpLearningAdvisor;

#[async_trait]
impl LearningAdvisor for NoOpLearningAdvisor {
    async fn propose(&self, _event: &FailureEvent) -> Option<WorkflowPlan> {
        None
    }
}
