//! Connection health monitoring for the downloader status sync.
//!
//! Wraps the "fetch `downloader/status`, apply to the store" step with
//! consecutive-failure counting, capped exponential backoff, and the
//! [`ConnectionState`] machine.
//!
//! # Concurrency Model
//!
//! - The steady-state cadence comes from a [`PollingScheduler`].
//! - After a failure, exactly one retry timer is pending. Scheduler ticks
//!   skip fetching while it is, so the backoff delay is the real gap between
//!   attempts.
//! - `alive` is cancelled on teardown. Every continuation checks it after
//!   its await, and an `epoch` bump on manual retry drops responses that
//!   belong to a previous run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use jobsync_core::normalize::extract_items;
use jobsync_core::{
    ConnectionPhase, ConnectionState, DownloadsBackend, JobStore, SyncConfig, SyncError,
    SyncResult,
};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backoff::BackoffPolicy;
use crate::scheduler::PollingScheduler;

/// Keeps the store's items in sync and tracks backend reachability.
pub struct ConnectionHealthMonitor {
    store: Arc<JobStore>,
    backend: Arc<dyn DownloadsBackend>,
    scheduler: PollingScheduler,
    policy: BackoffPolicy,
    state_tx: watch::Sender<ConnectionState>,
    alive: CancellationToken,
    retry_timer: Mutex<Option<CancellationToken>>,
    epoch: AtomicU64,
}

impl std::fmt::Debug for ConnectionHealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHealthMonitor")
            .field("state", &*self.state_tx.borrow())
            .field("policy", &self.policy)
            .field("alive", &!self.alive.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl ConnectionHealthMonitor {
    /// Create a monitor. Nothing runs until [`start`](Self::start).
    pub fn new(
        store: Arc<JobStore>,
        backend: Arc<dyn DownloadsBackend>,
        config: &SyncConfig,
    ) -> Arc<Self> {
        let (state_tx, _) = watch::channel(ConnectionState::new());
        Arc::new(Self {
            store,
            backend,
            scheduler: PollingScheduler::new(config.poll_interval),
            policy: BackoffPolicy::from_config(config),
            state_tx,
            alive: CancellationToken::new(),
            retry_timer: Mutex::new(None),
            epoch: AtomicU64::new(0),
        })
    }

    /// Start the sync loop. Returns `false` if already running or torn down.
    pub fn start(self: &Arc<Self>) -> bool {
        if self.alive.is_cancelled() {
            return false;
        }

        let weak = Arc::downgrade(self);
        self.scheduler.start_polling(move || {
            let weak: Weak<Self> = weak.clone();
            async move {
                match weak.upgrade() {
                    Some(monitor) => monitor.tick().await,
                    None => Ok(()),
                }
            }
        })
    }

    /// Manual retry: reset the counters and restart the sync loop.
    ///
    /// Returns `false` after teardown.
    pub fn retry(self: &Arc<Self>) -> bool {
        if self.alive.is_cancelled() {
            return false;
        }

        info!("Manual retry requested");
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.cancel_retry();
        self.state_tx.send_modify(ConnectionState::reset_for_retry);
        self.scheduler.stop_polling();
        self.start()
    }

    /// Tear down: stop the loop, cancel the pending retry, and drop any
    /// response still in flight.
    pub fn shutdown(&self) {
        if self.alive.is_cancelled() {
            return;
        }
        debug!("Connection health monitor shutting down");
        self.alive.cancel();
        self.scheduler.stop_polling();
        self.cancel_retry();
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state_tx.borrow().clone()
    }

    /// Watch connection state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Whether the sync loop is running.
    pub fn is_polling(&self) -> bool {
        self.scheduler.is_active()
    }

    /// The backoff policy in use.
    pub const fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    async fn tick(self: &Arc<Self>) -> SyncResult<()> {
        if self.state_tx.borrow().is_retrying {
            debug!("Backoff retry pending, skipping scheduled sync");
            return Ok(());
        }
        self.sync_once().await
    }

    /// Fetch the downloader status once and apply it.
    ///
    /// Failures are handled here (counted, backed off) and also returned.
    async fn sync_once(self: &Arc<Self>) -> SyncResult<()> {
        if self.alive.is_cancelled() {
            return Ok(());
        }
        let epoch = self.epoch.load(Ordering::SeqCst);

        let result = match self.backend.downloader_status().await {
            Ok(body) => extract_items(&body),
            Err(e) => Err(e),
        };

        if self.alive.is_cancelled() {
            debug!("Monitor torn down, dropping downloader status response");
            return Ok(());
        }
        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!("Response belongs to a previous run, dropping it");
            return Ok(());
        }

        match result {
            Ok(items) => {
                self.store.set_items(&items);
                let previous = self.state_tx.borrow().phase;
                self.state_tx.send_modify(ConnectionState::mark_connected);
                if previous != ConnectionPhase::Connected {
                    info!(?previous, "Downloader status sync connected");
                }
                Ok(())
            }
            Err(err) => {
                self.handle_failure(&err);
                Err(err)
            }
        }
    }

    fn handle_failure(self: &Arc<Self>, err: &SyncError) {
        let mut consecutive = 0;
        self.state_tx.send_modify(|state| {
            consecutive = state.record_failure(err.to_string());
        });

        if self.policy.is_exhausted(consecutive) {
            error!(
                consecutive_errors = consecutive,
                error = %err,
                "Too many consecutive sync failures, stopping automatic retries"
            );
            self.cancel_retry();
            self.state_tx.send_modify(ConnectionState::mark_disconnected);
            self.scheduler.stop_polling();
            return;
        }

        let delay = self.policy.delay_for(consecutive);
        warn!(
            consecutive_errors = consecutive,
            max_errors = self.policy.max_consecutive_errors(),
            delay_ms = delay.as_millis(),
            error = %err,
            "Downloader status sync failed, retrying with backoff"
        );
        self.state_tx.send_modify(|state| state.mark_retrying(delay));
        self.schedule_retry(delay);
    }

    fn schedule_retry(self: &Arc<Self>, delay: Duration) {
        let token = self.alive.child_token();
        if let Some(previous) = self.retry_slot().replace(token.clone()) {
            previous.cancel();
        }

        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
            let Some(monitor) = weak.upgrade() else {
                return;
            };
            if token.is_cancelled() {
                return;
            }
            debug!(delay_ms = delay.as_millis(), "Running backoff retry");
            // Failures re-arm the next retry inside sync_once
            let _ = monitor.sync_once().await;
        });
    }

    fn cancel_retry(&self) {
        if let Some(token) = self.retry_slot().take() {
            token.cancel();
        }
    }

    fn retry_slot(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.retry_timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ConnectionHealthMonitor {
    fn drop(&mut self) {
        self.alive.cancel();
    }
}
