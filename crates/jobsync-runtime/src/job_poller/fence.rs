//! Per-job request fencing.
//!
//! Job ticks are fire-and-forget, so two status requests for the same job
//! can be in flight at once and complete out of order. Each tick takes a
//! monotonically increasing sequence number; a response is applied only if
//! its sequence is newer than the last applied one. The check and the store
//! write happen under one lock, so an older response can never land after a
//! newer one.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

/// Sequence number of a status request.
pub type Sequence = u64;

/// Sequencing state for one job's poller.
#[derive(Debug, Default)]
pub struct JobFence {
    next: AtomicU64,
    applied: Mutex<Sequence>,
    failures: AtomicU32,
}

impl JobFence {
    /// Create a fence with nothing applied yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the sequence number for a new request. Starts at 1.
    pub fn next_sequence(&self) -> Sequence {
        self.next.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Last applied sequence (0 if none).
    pub fn last_applied(&self) -> Sequence {
        *self.applied.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `apply` if `seq` is newer than the last applied sequence and the
    /// poller is still live. Returns whether it ran.
    pub fn apply_if_newer(
        &self,
        seq: Sequence,
        live: &CancellationToken,
        apply: impl FnOnce(),
    ) -> bool {
        let mut applied = self.applied.lock().unwrap_or_else(PoisonError::into_inner);
        if live.is_cancelled() || seq <= *applied {
            return false;
        }
        *applied = seq;
        apply();
        true
    }

    /// Run `apply` and reject every response still in flight.
    pub fn close<R>(&self, apply: impl FnOnce() -> R) -> R {
        let mut applied = self.applied.lock().unwrap_or_else(PoisonError::into_inner);
        *applied = Sequence::MAX;
        apply()
    }

    /// Count a failed request. Returns the consecutive failure count, or
    /// `None` if a newer response was already applied.
    pub fn record_failure(&self, seq: Sequence) -> Option<u32> {
        let applied = self.applied.lock().unwrap_or_else(PoisonError::into_inner);
        if seq <= *applied {
            return None;
        }
        Some(self.failures.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Reset the consecutive failure count after a successful request.
    pub fn reset_failures(&self) {
        self.failures.store(0, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequences_are_monotonic() {
        let fence = JobFence::new();
        assert_eq!(fence.next_sequence(), 1);
        assert_eq!(fence.next_sequence(), 2);
        assert_eq!(fence.next_sequence(), 3);
    }

    #[test]
    fn test_stale_response_is_discarded() {
        let fence = JobFence::new();
        let live = CancellationToken::new();
        let first = fence.next_sequence();
        let second = fence.next_sequence();

        let mut log = Vec::new();
        assert!(fence.apply_if_newer(second, &live, || log.push(second)));
        assert!(!fence.apply_if_newer(first, &live, || log.push(first)));
        assert_eq!(log, vec![second]);
        assert_eq!(fence.last_applied(), second);
    }

    #[test]
    fn test_duplicate_sequence_is_discarded() {
        let fence = JobFence::new();
        let live = CancellationToken::new();
        let seq = fence.next_sequence();
        assert!(fence.apply_if_newer(seq, &live, || {}));
        assert!(!fence.apply_if_newer(seq, &live, || {}));
    }

    #[test]
    fn test_cancelled_poller_applies_nothing() {
        let fence = JobFence::new();
        let live = CancellationToken::new();
        live.cancel();
        assert!(!fence.apply_if_newer(fence.next_sequence(), &live, || {
            panic!("must not apply")
        }));
    }

    #[test]
    fn test_close_rejects_in_flight() {
        let fence = JobFence::new();
        let live = CancellationToken::new();
        let seq = fence.next_sequence();
        fence.close(|| {});
        assert!(!fence.apply_if_newer(seq, &live, || {}));
    }

    #[test]
    fn test_failure_counting() {
        let fence = JobFence::new();
        assert_eq!(fence.record_failure(fence.next_sequence()), Some(1));
        assert_eq!(fence.record_failure(fence.next_sequence()), Some(2));
        fence.reset_failures();
        assert_eq!(fence.record_failure(fence.next_sequence()), Some(1));
    }

    #[test]
    fn test_stale_failure_is_not_counted() {
        let fence = JobFence::new();
        let live = CancellationToken::new();
        let slow = fence.next_sequence();
        let fast = fence.next_sequence();

        assert!(fence.apply_if_newer(fast, &live, || {}));
        fence.reset_failures();
        assert_eq!(fence.record_failure(slow), None);
        assert_eq!(fence.record_failure(fence.next_sequence()), Some(1));
    }
}
