//! Picks a winner among competing developer workers within the
//! development stage.

use serde::{Deserialize, Serialize};

/// A worker's self-reported quality scores, each in `0..=100`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Scorecard {
    /// Overall quality score.
    pub overall: u8,
    /// Security review score.
    pub security: u8,
    /// GDPR/compliance score.
    pub gdpr: u8,
    /// Accessibility score.
    pub accessibility: u8,
    /// Code quality score.
    pub code_quality: u8,
}

/// One competing worker's submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSubmission {
    /// Identifies the worker (e.g. `"developer_a"`).
    pub worker_id: String,
    /// Path to the worker's produced artifact directory.
    pub artifact_dir: String,
    /// The worker's self-reported scorecard.
    pub scorecard: Scorecard,
    /// Count of critical (disqualifying) issues found in review.
    pub critical_issues: u32,
    /// When the worker finished, ISO 8601. Used as the final tie-break.
    pub completed_at: String,
}

/// Selects a winner from a set of competing submissions.
///
/// Disqualifies any submission with `critical_issues > 0`. Among the
/// rest, ranks by `overall` descending, breaking ties by `security`,
/// then `accessibility`, then earliest `completed_at`. Returns `None`
/// if every submission is disqualified.
#[must_use]
pub fn select_winner(submissions: &[WorkerSubmission]) -> Option<&WorkerSubmission> {
    submissions
        .iter()
        .filter(|s| s.critical_issues == 0)
        .max_by(|a, b| {
            a.scorecard
                .overall
                .cmp(&b.scorecard.overall)
                .then_with(|| a.scorecard.security.cmp(&b.scorecard.security))
                .then_with(|| a.scorecard.accessibility.cmp(&b.scorecard.accessibility))
                .then_with(|| b.completed_at.cmp(&a.completed_at))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(id: &str, overall: u8, security: u8, accessibility: u8, critical: u32, completed_at: &str) -> WorkerSubmission {
        WorkerSubmission {
            worker_id: id.to_string(),
            artifact_dir: format!("/tmp/{id}"),
            scorecard: Scorecard {
                overall,
                security,
                gdpr: 80,
                accessibility,
                code_quality: 80,
            },
            critical_issues: critical,
            completed_at: completed_at.to_string(),
        }
    }

    #[test]
    fn test_highest_overall_wins() {
        let submissions = vec![
            submission("a", 70, 80, 80, 0, "2026-01-01T00:00:00Z"),
            submission("b", 90, 60, 60, 0, "2026-01-01T00:05:00Z"),
        ];
        let winner = select_winner(&submissions).unwrap();
        assert_eq!(winner.worker_id, "b");
    }

    #[test]
    fn test_critical_issues_disqualify() {
        let submissions = vec![
            submission("a", 95, 90, 90, 1, "2026-01-01T00:00:00Z"),
            submission("b", 60, 50, 50, 0, "2026-01-01T00:05:00Z"),
        ];
        let winner = select_winner(&submissions).unwrap();
        assert_eq!(winner.worker_id, "b");
    }

    #[test]
    fn test_all_disqualified_returns_none() {
        let submissions = vec![submission("a", 95, 90, 90, 2, "2026-01-01T00:00:00Z")];
        assert!(select_winner(&submissions).is_none());
    }

    #[test]
    fn test_tie_broken_by_security_then_accessibility_then_earliest() {
        let submissions = vec![
            submission("a", 80, 70, 90, 0, "2026-01-01T00:10:00Z"),
            submission("b", 80, 75, 60, 0, "2026-01-01T00:05:00Z"),
        ];
        let winner = select_winner(&submissions).unwrap();
        assert_eq!(winner.worker_id, "b");

        let submissions = vec![
            submission("c", 80, 70, 90, 0, "2026-01-01T00:10:00Z"),
            submission("d", 80, 70, 60, 0, "2026-01-01T00:05:00Z"),
        ];
        let winner = select_winner(&submissions).unwrap();
        assert_eq!(winner.worker_id, "c");

        let submissions = vec![
            submission("e", 80, 70, 60, 0, "2026-01-01T00:10:00Z"),
            submission("f", 80, 70, 60, 0, "2026-01-01T00:05:00Z"),
        ];
        let winner = select_winner(&submissions).unwrap();
        assert_eq!(winner.worker_id, "f");
    }
}
