//! Connection health state for the downloader status sync.
//!
//! The state is a small finite machine:
//!
//! ```text
//! CONNECTING --success--> CONNECTED --failure--> ERROR --ceiling--> DISCONNECTED
//!      ^                      ^                    |                    |
//!      |                      +------success-------+                    |
//!      +--------------------------- retry() ----------------------------+
//! ```
//!
//! Transitions are pure methods here; the runtime monitor decides when to
//! call them.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Consecutive errors after which a connection banner is worth showing.
pub const BANNER_ERROR_THRESHOLD: u32 = 3;

/// Phase of the connection to the downloader backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionPhase {
    /// Waiting for the first successful sync (initially, or after `retry`).
    Connecting,
    /// The last sync succeeded.
    Connected,
    /// The last sync failed; a backoff retry is scheduled.
    Error,
    /// The failure ceiling was reached; automatic retries stopped.
    Disconnected,
}

/// Health of the downloader status sync.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    /// Current phase.
    pub phase: ConnectionPhase,
    /// Failures since the last success.
    pub consecutive_errors: u32,
    /// Failures since construction; never reset.
    pub total_errors: u64,
    /// Message of the most recent failure.
    pub last_error: Option<String>,
    /// Whether a backoff retry is pending.
    pub is_retrying: bool,
    /// Delay of the pending retry, in milliseconds.
    pub next_retry_ms: Option<u64>,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionState {
    /// Initial state: connecting, no errors.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: ConnectionPhase::Connecting,
            consecutive_errors: 0,
            total_errors: 0,
            last_error: None,
            is_retrying: false,
            next_retry_ms: None,
        }
    }

    /// A sync succeeded.
    pub fn mark_connected(&mut self) {
        self.phase = ConnectionPhase::Connected;
        self.consecutive_errors = 0;
        self.last_error = None;
        self.is_retrying = false;
        self.next_retry_ms = None;
    }

    /// A sync failed. Returns the new consecutive error count.
    pub fn record_failure(&mut self, message: impl Into<String>) -> u32 {
        self.phase = ConnectionPhase::Error;
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);
        self.total_errors = self.total_errors.saturating_add(1);
        self.last_error = Some(message.into());
        self.consecutive_errors
    }

    /// A backoff retry was scheduled after `delay`.
    pub fn mark_retrying(&mut self, delay: Duration) {
        self.is_retrying = true;
        self.next_retry_ms = Some(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX));
    }

    /// The failure ceiling was reached.
    pub fn mark_disconnected(&mut self) {
        self.phase = ConnectionPhase::Disconnected;
        self.is_retrying = false;
        self.next_retry_ms = None;
    }

    /// A manual retry was requested.
    pub fn reset_for_retry(&mut self) {
        self.phase = ConnectionPhase::Connecting;
        self.consecutive_errors = 0;
        self.last_error = None;
        self.is_retrying = false;
        self.next_retry_ms = None;
    }

    /// Whether the last sync succeeded.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.phase == ConnectionPhase::Connected
    }

    /// Whether the last sync failed and a retry is pending.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.phase == ConnectionPhase::Error
    }

    /// Whether automatic retries have stopped.
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.phase == ConnectionPhase::Disconnected
    }

    /// Whether a consumer should show a persistent, retryable error banner.
    #[must_use]
    pub fn should_show_banner(&self) -> bool {
        match self.phase {
            ConnectionPhase::Error => self.consecutive_errors > BANNER_ERROR_THRESHOLD,
            ConnectionPhase::Disconnected => true,
            ConnectionPhase::Connecting | ConnectionPhase::Connected => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_then_success() {
        let mut state = ConnectionState::new();
        assert_eq!(state.record_failure("timeout"), 1);
        state.mark_retrying(Duration::from_secs(1));
        assert!(state.has_error());
        assert!(state.is_retrying);
        assert_eq!(state.next_retry_ms, Some(1000));

        state.mark_connected();
        assert!(state.is_connected());
        assert_eq!(state.consecutive_errors, 0);
        assert_eq!(state.total_errors, 1);
        assert!(state.last_error.is_none());
        assert!(!state.is_retrying);
    }

    #[test]
    fn test_disconnect_and_manual_retry() {
        let mut state = ConnectionState::new();
        for _ in 0..10 {
            state.record_failure("refused");
        }
        state.mark_disconnected();
        assert!(state.is_disconnected());
        assert_eq!(state.last_error.as_deref(), Some("refused"));

        state.reset_for_retry();
        assert_eq!(state.phase, ConnectionPhase::Connecting);
        assert_eq!(state.consecutive_errors, 0);
        assert_eq!(state.total_errors, 10);
    }

    #[test]
    fn test_banner_visibility() {
        let mut state = ConnectionState::new();
        assert!(!state.should_show_banner());
        for _ in 0..BANNER_ERROR_THRESHOLD {
            state.record_failure("x");
        }
        assert!(!state.should_show_banner());
        state.record_failure("x");
        assert!(state.should_show_banner());
        state.mark_disconnected();
        assert!(state.should_show_banner());
    }

    #[test]
    fn test_phase_serialization() {
        let json = serde_json::to_string(&ConnectionPhase::Disconnected).unwrap();
        assert_eq!(json, "\"DISCONNECTED\"");
    }
}
