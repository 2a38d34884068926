//! Error taxonomy for the orchestration kernel.
//!
//! Every variant maps to exactly one failure mode described in the state
//! machine and supervisor contracts; callers match on the variant rather
//! than parsing message text.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type returned by orchestrator, supervisor, and state
/// machine operations.
#[derive(Debug, Error)]
pub enum ArtemisError {
    /// Configuration failed eager validation at startup.
    #[error("configuration invalid: {0}")]
    ConfigurationInvalid(String),

    /// A card referenced by id does not exist on the board.
    #[error("card not found: {0}")]
    CardNotFound(String),

    /// The kanban board backend could not be reached.
    #[error("kanban board unavailable: {0}")]
    BoardUnavailable(String),

    /// Moving a card would exceed the destination column's WIP limit.
    #[error("WIP limit exceeded for column '{column}' (limit {limit})")]
    WipLimitExceeded {
        /// The column that is full.
        column: String,
        /// The configured limit.
        limit: usize,
    },

    /// The run's budget tracker rejected further spend.
    #[error("budget exceeded: spent {spent} of {limit} ({unit})")]
    BudgetExceeded {
        /// Amount already spent.
        spent: f64,
        /// Configured limit.
        limit: f64,
        /// Unit of measure (e.g. "usd", "tokens").
        unit: String,
    },

    /// A stage did not return within its configured timeout.
    #[error("stage '{0}' timed out")]
    StageTimedOut(String),

    /// A stage returned a terminal failure after retries were exhausted.
    #[error("stage '{stage}' failed: {reason}")]
    StageFailed {
        /// The stage name.
        stage: String,
        /// The failure reason reported by the stage.
        reason: String,
    },

    /// The circuit breaker for a stage is open and is rejecting attempts.
    #[error("circuit open for stage '{0}'")]
    CircuitOpen(String),

    /// The recovery workflow engine could not resolve an issue.
    #[error("recovery workflow failed for issue '{issue_type}' after action '{last_action}'")]
    WorkflowFailed {
        /// The issue type the workflow was handling.
        issue_type: String,
        /// The last action the workflow attempted.
        last_action: String,
    },

    /// A requested state transition is not legal from the current state.
    #[error("invalid transition from '{from}' to '{to}' on event '{event}'")]
    InvalidTransition {
        /// The state the machine was in.
        from: String,
        /// The state that was requested.
        to: String,
        /// The event that triggered the attempt.
        event: String,
    },

    /// The retrieval-augmented-generation backend could not be reached.
    #[error("RAG store unavailable: {0}")]
    RagUnavailable(String),

    /// Sending or receiving a message failed.
    #[error("messenger error: {0}")]
    MessengerError(String),

    /// Reading or writing a state machine snapshot failed.
    #[error("snapshot io error: {0}")]
    SnapshotIoError(String),

    /// The sandbox blocked execution because a pre-execution scan failed.
    #[error("sandbox blocked by scan: {0}")]
    SandboxBlockedByScan(String),

    /// The sandbox terminated a stage for exceeding resource limits.
    #[error("sandbox resource limit exceeded: {0}")]
    SandboxResourceExceeded(String),

    /// A data conflict occurred writing to an append-only context namespace.
    #[error("{0}")]
    DataConflict(#[from] DataConflictError),

    /// Cancellation was requested and propagated.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A generic internal error that does not fit another variant.
    #[error("internal error: {0}")]
    Internal(String),

    /// IO error not otherwise classified.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ArtemisError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl ArtemisError {
    /// Returns a short machine-readable kind string, used as the `kind`
    /// field of error events and in CLI diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigurationInvalid(_) => "configuration_invalid",
            Self::CardNotFound(_) => "card_not_found",
            Self::BoardUnavailable(_) => "board_unavailable",
            Self::WipLimitExceeded { .. } => "wip_limit_exceeded",
            Self::BudgetExceeded { .. } => "budget_exceeded",
            Self::StageTimedOut(_) => "stage_timed_out",
            Self::StageFailed { .. } => "stage_failed",
            Self::CircuitOpen(_) => "circuit_open",
            Self::WorkflowFailed { .. } => "workflow_failed",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::RagUnavailable(_) => "rag_unavailable",
            Self::MessengerError(_) => "messenger_error",
            Self::SnapshotIoError(_) => "snapshot_io_error",
            Self::SandboxBlockedByScan(_) => "sandbox_blocked_by_scan",
            Self::SandboxResourceExceeded(_) => "sandbox_resource_exceeded",
            Self::DataConflict(_) => "data_conflict",
            Self::Cancelled(_) => "cancelled",
            Self::Serialization(_) => "serialization_error",
            Self::Internal(_) => "internal_error",
            Self::Io(_) => "io_error",
        }
    }

    /// Returns the CLI exit code associated with this error class.
    ///
    /// Mirrors the binary's documented mapping: a successful run's exit
    /// code is derived from `Report::status` instead (0/2/3 for
    /// `COMPLETED_SUCCESSFULLY`/`FAILED_CODE_REVIEW`/`FAILED_STAGE`);
    /// this method only covers errors that prevent a `Report` from ever
    /// being produced.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConfigurationInvalid(_) => 4,
            Self::CardNotFound(_) => 5,
            _ => 1,
        }
    }
}

/// Error raised when writing to an already-occupied key in an
/// append-only context namespace.
#[derive(Debug, Clone, Error)]
#[error("data conflict: key '{key}' already exists in namespace '{namespace}'")]
pub struct DataConflictError {
    /// The namespace the write targeted.
    pub namespace: String,
    /// The conflicting key.
    pub key: String,
}

impl DataConflictError {
    /// Creates a new data conflict error.
    #[must_use]
    pub fn new(namespace: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            key: key.into(),
        }
    }
}

/// Structured diagnostic attached to workflow and supervisor errors,
/// separate from the `Display` message so tooling can render it.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ErrorInfo {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable summary.
    pub summary: String,
    /// Additional structured context.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ErrorInfo {
    /// Creates a new error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            context: HashMap::new(),
        }
    }

    /// Adds a context entry.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ArtemisError::ConfigurationInvalid("x".into()).exit_code(), 4);
        assert_eq!(ArtemisError::CardNotFound("x".into()).exit_code(), 5);
        assert_eq!(
            ArtemisError::WorkflowFailed {
                issue_type: "a".into(),
                last_action: "b".into()
            }
            .exit_code(),
            1
        );
        assert_eq!(
            ArtemisError::BudgetExceeded {
                spent: 1.0,
                limit: 1.0,
                unit: "usd".into()
            }
            .exit_code(),
            1
        );
        assert_eq!(ArtemisError::Internal("x".into()).exit_code(), 1);
    }

    #[test]
    fn test_kind_strings_are_stable() {
        assert_eq!(ArtemisError::CircuitOpen("s".into()).kind(), "circuit_open");
        assert_eq!(
            ArtemisError::InvalidTransition {
                from: "a".into(),
                to: "b".into(),
                event: "e".into()
            }
            .kind(),
            "invalid_transition"
        );
    }

    #[test]
    fn test_data_conflict_message() {
        let err = DataConflictError::new("shared_data", "plan");
        assert!(err.to_string().contains("shared_data"));
        assert!(err.to_string().contains("plan"));
    }
}
