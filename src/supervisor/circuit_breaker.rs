//! Per-stage circuit breaker.

use std::time::{Duration, Instant};

/// Tracks consecutive failures for one stage and opens the circuit once
/// a threshold is crossed, rejecting further attempts until a cooldown
/// elapses.
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

impl CircuitBreaker {
    /// Creates a breaker with the given threshold and cooldown.
    #[must_use]
    pub fn new(threshold: u32, cooldown_seconds: u64) -> Self {
        Self {
            threshold,
            cooldown: Duration::from_secs(cooldown_seconds),
            consecutive_failures: 0,
            opened_at: None,
        }
    }

    /// Returns true if the circuit is currently open, transitioning it
    /// back to closed (half-open, in effect) if the cooldown has
    /// elapsed.
    pub fn is_open(&mut self) -> bool {
        match self.opened_at {
            Some(opened) if opened.elapsed() >= self.cooldown => {
                self.opened_at = None;
                self.consecutive_failures = 0;
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Records a failure, opening the circuit if the threshold is
    /// reached.
    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.threshold {
            self.opened_at = Some(Instant::now());
        }
    }

    /// Records a success, resetting the failure count.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.opened_at = None;
    }

    /// Forces the circuit closed, as requested by a `reset_circuit`
    /// recovery action.
    pub fn force_close(&mut self) {
        self.consecutive_failures = 0;
        self.opened_at = None;
    }

    /// Returns the current consecutive-failure count.
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}
