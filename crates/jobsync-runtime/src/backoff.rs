//! Capped exponential backoff.

use std::time::Duration;

use jobsync_core::SyncConfig;

/// Retry policy for consecutive sync failures.
///
/// The n-th consecutive failure (1-based) waits `min(base * 2^(n-1), max)`.
/// Once `max_consecutive_errors` is reached, retries stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base: Duration,
    max: Duration,
    max_consecutive_errors: u32,
}

impl BackoffPolicy {
    /// Create a policy.
    pub const fn new(base: Duration, max: Duration, max_consecutive_errors: u32) -> Self {
        Self {
            base,
            max,
            max_consecutive_errors,
        }
    }

    /// Build the policy described by `config`.
    pub const fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            config.backoff_base,
            config.backoff_max,
            config.max_consecutive_errors,
        )
    }

    /// Delay before retrying after `consecutive_errors` failures in a row.
    pub fn delay_for(&self, consecutive_errors: u32) -> Duration {
        let Some(exponent) = consecutive_errors.checked_sub(1) else {
            return Duration::ZERO;
        };
        self.base
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max)
    }

    /// Whether `consecutive_errors` reached the ceiling.
    pub const fn is_exhausted(&self, consecutive_errors: u32) -> bool {
        consecutive_errors >= self.max_consecutive_errors
    }

    /// The failure ceiling.
    pub const fn max_consecutive_errors(&self) -> u32 {
        self.max_consecutive_errors
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_sequence() {
        let policy = BackoffPolicy::default();
        let delays: Vec<u128> = (1..=8).map(|n| policy.delay_for(n).as_millis()).collect();
        assert_eq!(
            delays,
            vec![1000, 2000, 4000, 8000, 16000, 30000, 30000, 30000]
        );
    }

    #[test]
    fn test_zero_failures_means_no_delay() {
        assert_eq!(BackoffPolicy::default().delay_for(0), Duration::ZERO);
    }

    #[test]
    fn test_huge_counts_saturate_at_cap() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for(64), Duration::from_secs(30));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_ceiling() {
        let policy = BackoffPolicy::default();
        assert!(!policy.is_exhausted(9));
        assert!(policy.is_exhausted(10));
        assert!(policy.is_exhausted(11));
    }
}
