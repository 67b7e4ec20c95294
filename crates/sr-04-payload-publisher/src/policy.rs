//! Bounded retry with exponential backoff.

use std::time::Duration;

use rand::Rng;

/// Retry budget for one recipient+payload pair.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Total attempts (first try included).
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles each retry.
    pub base_delay: Duration,
    /// Ceiling on any single backoff delay.
    pub max_delay: Duration,
    /// Budget for one push call.
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
            call_timeout: Duration::from_secs(15),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (1-based), with up to 25%
    /// jitter so recipients knocked out together do not retry in
    /// lockstep.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(16);
        let raw = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(exp))
            .min(self.max_delay);
        let jitter = rand::thread_rng().gen_range(0..=raw.as_millis() as u64 / 4);
        raw + Duration::from_millis(jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            call_timeout: Duration::from_secs(1),
        };
        // Jitter adds at most 25%, so check lower bounds and the cap.
        assert!(policy.backoff(1) >= Duration::from_millis(100));
        assert!(policy.backoff(2) >= Duration::from_millis(200));
        assert!(policy.backoff(3) >= Duration::from_millis(350));
        assert!(policy.backoff(10) <= Duration::from_millis(350 + 87 + 1));
    }
}
