//! Single-flight polling scheduler.
//!
//! A cancellable repeating task: invoke the fetch step, await it to
//! completion (success or failure), sleep a fixed delay, repeat. There is
//! never more than one fetch outstanding from a scheduler, and at most one
//! loop is active at a time.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use jobsync_core::SyncResult;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Runs one polling loop at a time.
#[derive(Debug)]
pub struct PollingScheduler {
    interval: Duration,
    active: Mutex<Option<CancellationToken>>,
}

impl PollingScheduler {
    /// Create an inactive scheduler with the given delay between runs.
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            active: Mutex::new(None),
        }
    }

    /// Delay between the end of one fetch and the start of the next.
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Start the loop. A no-op returning `false` if a loop is already active.
    ///
    /// The first fetch runs immediately. Fetch errors are logged and do not
    /// stop the loop. Must be called from within a Tokio runtime.
    pub fn start_polling<F, Fut>(&self, fetch: F) -> bool
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = SyncResult<()>> + Send + 'static,
    {
        let mut active = self.lock();
        if active.as_ref().is_some_and(|token| !token.is_cancelled()) {
            debug!("Polling already active, ignoring start");
            return false;
        }

        let token = CancellationToken::new();
        *active = Some(token.clone());
        drop(active);

        let interval = self.interval;
        tokio::spawn(async move {
            debug!(interval_ms = interval.as_millis(), "Polling loop started");
            while !token.is_cancelled() {
                if let Err(e) = fetch().await {
                    debug!(error = %e, "Poll fetch failed");
                }

                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    () = tokio::time::sleep(interval) => {}
                }
            }
            debug!("Polling loop stopped");
        });

        true
    }

    /// Stop the loop. Returns `false` if no loop was active.
    ///
    /// A fetch already in flight finishes but does not reschedule.
    pub fn stop_polling(&self) -> bool {
        let token = self.lock().take();
        token.is_some_and(|token| {
            let was_active = !token.is_cancelled();
            token.cancel();
            was_active
        })
    }

    /// Whether a loop is active.
    pub fn is_active(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        if let Some(token) = self.lock().take() {
            token.cancel();
        }
    }
}
