//! Retry policy with exponential backoff and jitter.
//!
//! Applied uniformly to page fetches and image downloads: one policy
//! object, constructed from config, decides attempt counts and delays.

use std::time::Duration;

use rand::Rng;

/// Bounded exponential backoff policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first (1 = no retries).
    pub max_attempts: u32,
    /// Delay before the first retry; doubles each attempt.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Policy used when config does not override it: 3 attempts,
    /// 500 ms base, 10 s cap.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: Duration::from_secs(10),
        }
    }

    /// Delay before retry number `attempt` (0-based: the delay after the
    /// first failure is `backoff(0)`). Exponential with up to 50% jitter,
    /// capped at `max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.saturating_mul(1u32 << attempt.min(16));
        let capped = exp.min(self.max_delay);
        let jitter_ms = capped.as_millis() as u64 / 2;
        if jitter_ms == 0 {
            return capped;
        }
        let extra = rand::rng().random_range(0..=jitter_ms);
        (capped + Duration::from_millis(extra)).min(self.max_delay)
    }

    /// Whether another attempt is allowed after `attempt` failures.
    pub fn should_retry(&self, failures: u32) -> bool {
        failures < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_stays_bounded() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        for attempt in 0..8 {
            let d = policy.backoff(attempt);
            // Never below the deterministic exponential floor (pre-jitter,
            // pre-cap), never above the cap.
            let floor = Duration::from_millis(100)
                .saturating_mul(1 << attempt)
                .min(policy.max_delay);
            assert!(d >= floor, "attempt {attempt}: {d:?} < {floor:?}");
            assert!(d <= policy.max_delay);
        }
    }

    #[test]
    fn attempt_accounting() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn zero_attempts_clamped_to_one() {
        let policy = RetryPolicy::new(0, Duration::from_millis(1));
        assert_eq!(policy.max_attempts, 1);
    }
}
