//! Sync configuration.
//!
//! Durations are (de)serialized as integer milliseconds, so the config can be
//! loaded from the same JSON settings blob as the rest of the application.
//!
//! # Example
//!
//! ```
//! use jobsync_core::SyncConfig;
//! use std::time::Duration;
//!
//! let config = SyncConfig::new()
//!     .with_poll_interval(Duration::from_millis(500))
//!     .with_max_consecutive_errors(5);
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default delay between downloader status syncs.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Default base delay of the failure backoff.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(1000);

/// Default cap of the failure backoff.
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_millis(30_000);

/// Default consecutive failures before automatic retries stop.
pub const DEFAULT_MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// Default consecutive network failures tolerated by a job poller.
pub const DEFAULT_MAX_JOB_POLL_FAILURES: u32 = 3;

/// Default capacity of the job notification channel.
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 64;

/// Configuration for the sync loops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    /// Delay between downloader status syncs.
    #[serde(rename = "pollIntervalMs", with = "millis")]
    pub poll_interval: Duration,

    /// Base delay of the failure backoff.
    #[serde(rename = "backoffBaseMs", with = "millis")]
    pub backoff_base: Duration,

    /// Cap of the failure backoff.
    #[serde(rename = "backoffMaxMs", with = "millis")]
    pub backoff_max: Duration,

    /// Consecutive failures after which automatic retries stop.
    pub max_consecutive_errors: u32,

    /// Per-job poll cadence for every kind. `None` uses each kind's default.
    #[serde(rename = "jobPollIntervalMs", with = "millis_opt")]
    pub job_poll_interval: Option<Duration>,

    /// Consecutive network failures after which a job is marked failed.
    pub max_job_poll_failures: u32,

    /// Capacity of the job notification broadcast channel.
    pub notification_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_max: DEFAULT_BACKOFF_MAX,
            max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
            job_poll_interval: None,
            max_job_poll_failures: DEFAULT_MAX_JOB_POLL_FAILURES,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
        }
    }
}

impl SyncConfig {
    /// Create a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the delay between downloader status syncs.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the backoff base delay and cap.
    #[must_use]
    pub const fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_max = max;
        self
    }

    /// Set the failure ceiling.
    #[must_use]
    pub const fn with_max_consecutive_errors(mut self, max: u32) -> Self {
        self.max_consecutive_errors = max;
        self
    }

    /// Override the per-job poll cadence for every kind.
    #[must_use]
    pub const fn with_job_poll_interval(mut self, interval: Duration) -> Self {
        self.job_poll_interval = Some(interval);
        self
    }

    /// Set how many consecutive network failures a job poller tolerates.
    #[must_use]
    pub const fn with_max_job_poll_failures(mut self, max: u32) -> Self {
        self.max_job_poll_failures = max;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("pollIntervalMs"));
        }
        if self.job_poll_interval.is_some_and(|d| d.is_zero()) {
            return Err(ConfigError::ZeroInterval("jobPollIntervalMs"));
        }
        if self.backoff_base.is_zero() {
            return Err(ConfigError::ZeroInterval("backoffBaseMs"));
        }
        if self.backoff_base > self.backoff_max {
            return Err(ConfigError::InvertedBackoff {
                base_ms: self.backoff_base.as_millis(),
                max_ms: self.backoff_max.as_millis(),
            });
        }
        if self.max_consecutive_errors == 0 {
            return Err(ConfigError::ZeroLimit("maxConsecutiveErrors"));
        }
        if self.max_job_poll_failures == 0 {
            return Err(ConfigError::ZeroLimit("maxJobPollFailures"));
        }
        if self.notification_capacity == 0 {
            return Err(ConfigError::ZeroLimit("notificationCapacity"));
        }
        Ok(())
    }
}

/// Configuration validation error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),

    #[error("{0} must be at least 1")]
    ZeroLimit(&'static str),

    #[error("backoff base ({base_ms}ms) exceeds backoff cap ({max_ms}ms)")]
    InvertedBackoff { base_ms: u128, max_ms: u128 },
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod millis_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::new();
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.backoff_base, Duration::from_secs(1));
        assert_eq!(config.backoff_max, Duration::from_secs(30));
        assert_eq!(config.max_consecutive_errors, 10);
        assert!(config.job_poll_interval.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_partial_json() {
        let config: SyncConfig =
            serde_json::from_str(r#"{"pollIntervalMs": 250, "jobPollIntervalMs": 1500}"#).unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.job_poll_interval, Some(Duration::from_millis(1500)));
        assert_eq!(config.max_consecutive_errors, DEFAULT_MAX_CONSECUTIVE_ERRORS);
    }

    #[test]
    fn test_serialize_uses_millis() {
        let json = serde_json::to_value(SyncConfig::new()).unwrap();
        assert_eq!(json["pollIntervalMs"], 1000);
        assert_eq!(json["backoffMaxMs"], 30_000);
        assert!(json["jobPollIntervalMs"].is_null());
    }

    #[test]
    fn test_validation() {
        let config = SyncConfig::new().with_poll_interval(Duration::ZERO);
        assert_eq!(config.validate(), Err(ConfigError::ZeroInterval("pollIntervalMs")));

        let config = SyncConfig::new().with_backoff(Duration::from_secs(60), Duration::from_secs(30));
        assert!(matches!(config.validate(), Err(ConfigError::InvertedBackoff { .. })));

        let config = SyncConfig::new().with_max_consecutive_errors(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroLimit("maxConsecutiveErrors")));
    }
}
