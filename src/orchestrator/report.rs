//! The structured output of one `RunFullPipeline` call.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::supervisor::RetryHistoryEntry;

/// The terminal outcome of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Every stage completed or was intentionally skipped.
    CompletedSuccessfully,
    /// Code review failed on every retry attempt.
    FailedCodeReview,
    /// A non-recoverable stage failure stopped the run.
    FailedStage {
        /// The stage that failed.
        stage: String,
    },
    /// The run was aborted by an external cancellation signal.
    Aborted,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CompletedSuccessfully => write!(f, "COMPLETED_SUCCESSFULLY"),
            Self::FailedCodeReview => write!(f, "FAILED_CODE_REVIEW"),
            Self::FailedStage { stage } => write!(f, "FAILED_STAGE:{stage}"),
            Self::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// A compact, JSON-serializable record of one stage's attempt within a
/// run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSnapshot {
    /// The stage's name.
    pub stage_name: String,
    /// The terminal status for this stage within the run.
    pub status: String,
    /// Wall-clock duration of the stage's final attempt.
    pub duration_seconds: f64,
    /// A compact copy of the stage's result data.
    #[serde(default)]
    pub result: HashMap<String, serde_json::Value>,
}

/// The full report produced by a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// The card this run executed.
    pub card_id: String,
    /// The terminal status.
    pub status: RunStatus,
    /// Per-stage snapshots, in execution order.
    pub stages: Vec<StageSnapshot>,
    /// Total retry attempts across the whole run.
    pub total_retries: u32,
    /// The code-review retry history, if any retries occurred.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_history: Option<Vec<RetryHistoryEntry>>,
    /// When the run started, ISO 8601.
    pub started_at: String,
    /// When the run ended, ISO 8601.
    pub ended_at: String,
}
