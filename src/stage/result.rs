//! The result a stage execution produces.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The terminal status a stage reports for one execution attempt.
///
/// This is distinct from the richer per-stage lifecycle state tracked by
/// the state machine (`pending`/`running`/`retrying`/...): a `Stage`
/// only ever reports one of these three outcomes for a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageStatus {
    /// The stage completed its work.
    Complete,
    /// The stage failed and should be retried or surfaced as a failure.
    Fail,
    /// The stage was intentionally skipped.
    Skip,
}

impl StageStatus {
    /// Returns true for `Complete` or `Skip` — outcomes that let the
    /// pipeline proceed.
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Complete | Self::Skip)
    }
}

/// The JSON-serializable result of one stage execution attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    /// The outcome of this attempt.
    pub status: StageStatus,
    /// Stage-specific fields, e.g. `overall_status` for code review.
    #[serde(flatten)]
    pub data: HashMap<String, serde_json::Value>,
    /// Human-readable reason, set on `Fail` or `Skip`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl StageResult {
    /// Builds a successful result with the given data fields.
    #[must_use]
    pub fn complete(data: HashMap<String, serde_json::Value>) -> Self {
        Self {
            status: StageStatus::Complete,
            data,
            reason: None,
        }
    }

    /// Builds a successful result with no extra fields.
    #[must_use]
    pub fn complete_empty() -> Self {
        Self::complete(HashMap::new())
    }

    /// Builds a failing result with a reason.
    #[must_use]
    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Fail,
            data: HashMap::new(),
            reason: Some(reason.into()),
        }
    }

    /// Builds a skip result with a reason.
    #[must_use]
    pub fn skip(reason: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Skip,
            data: HashMap::new(),
            reason: Some(reason.into()),
        }
    }

    /// Returns true if this attempt can be treated as a success for
    /// pipeline-progression purposes.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Gets a data field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_is_success() {
        let result = StageResult::complete_empty();
        assert!(result.is_success());
    }

    #[test]
    fn test_skip_is_success() {
        let result = StageResult::skip("circuit_open");
        assert!(result.is_success());
        assert_eq!(result.reason.as_deref(), Some("circuit_open"));
    }

    #[test]
    fn test_fail_is_not_success() {
        let result = StageResult::fail("boom");
        assert!(!result.is_success());
    }

    #[test]
    fn test_serialization_round_trip() {
        let mut result = StageResult::complete_empty();
        result.data.insert("overall_status".to_string(), serde_json::json!("PASS"));

        let json = serde_json::to_string(&result).unwrap();
        let restored: StageResult = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.status, StageStatus::Complete);
        assert_eq!(restored.get("overall_status"), Some(&serde_json::json!("PASS")));
    }
}
