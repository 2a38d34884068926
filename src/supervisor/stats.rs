//! Aggregated per-stage execution statistics.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Running counters for one stage's executions, accumulated across a
/// supervisor's lifetime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageStats {
    /// Total attempts (including retries).
    pub executions: u64,
    /// Total failed attempts.
    pub failures: u64,
    /// Cumulative successful-attempt duration, for averaging.
    total_success_seconds: f64,
    /// Count of successful attempts, for averaging.
    success_count: u64,
}

impl StageStats {
    /// Records one attempt's outcome.
    pub fn record(&mut self, succeeded: bool, duration_seconds: f64) {
        self.executions += 1;
        if succeeded {
            self.success_count += 1;
            self.total_success_seconds += duration_seconds;
        } else {
            self.failures += 1;
        }
    }

    /// Fraction of attempts that failed, in `[0.0, 1.0]`.
    #[must_use]
    pub fn failure_rate(&self) -> f64 {
        if self.executions == 0 {
            0.0
        } else {
            self.failures as f64 / self.executions as f64
        }
    }

    /// Mean duration of successful attempts, in seconds.
    #[must_use]
    pub fn average_success_duration_seconds(&self) -> f64 {
        if self.success_count == 0 {
            0.0
        } else {
            self.total_success_seconds / self.success_count as f64
        }
    }
}

/// A point-in-time summary across every supervised stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// Overall label: `"healthy"`, `"degraded"`, or `"critical"`.
    pub overall: String,
    /// Per-stage failure rate and open-breaker flag.
    pub stages: HashMap<String, StageHealth>,
}

/// Health summary for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageHealth {
    /// Fraction of attempts that failed.
    pub failure_rate: f64,
    /// Whether the stage's circuit breaker is currently open.
    pub circuit_open: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_rate() {
        let mut stats = StageStats::default();
        stats.record(true, 1.0);
        stats.record(false, 0.0);
        assert!((stats.failure_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_average_duration_only_counts_successes() {
        let mut stats = StageStats::default();
        stats.record(true, 2.0);
        stats.record(true, 4.0);
        stats.record(false, 0.0);
        assert!((stats.average_success_duration_seconds() - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_stats_are_zero() {
        let stats = StageStats::default();
        assert_eq!(stats.failure_rate(), 0.0);
        assert_eq!(stats.average_success_duration_seconds(), 0.0);
    }
}
