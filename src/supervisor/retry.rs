//! Exponential backoff for stage retries.

use rand::Rng;
use std::time::Duration;

/// Computes the delay before the next retry attempt, given the number
/// of attempts already made (0-indexed) and a recovery strategy.
///
/// `delay = retry_delay_seconds * backoff_multiplier^attempt`, with up to
/// 20% full jitter applied to avoid synchronized retries across
/// concurrently supervised stages.
#[must_use]
pub fn backoff_delay(attempt: u32, retry_delay_seconds: f64, backoff_multiplier: f64) -> Duration {
    let base = retry_delay_seconds * backoff_multiplier.powi(attempt as i32);
    let jitter_fraction = rand::thread_rng().gen_range(0.0..0.2);
    let delayed = base * (1.0 + jitter_fraction);
    Duration::from_secs_f64(delayed.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_grows_with_attempt() {
        let first = backoff_delay(0, 5.0, 2.0);
        let second = backoff_delay(1, 5.0, 2.0);
        assert!(second >= first);
    }

    #[test]
    fn test_delay_has_jitter_ceiling() {
        for attempt in 0..3 {
            let delay = backoff_delay(attempt, 1.0, 2.0);
            let base = 2f64.powi(attempt as i32);
            assert!(delay.as_secs_f64() <= base * 1.2 + 0.001);
            assert!(delay.as_secs_f64() >= base);
        }
    }
}
