//! Per-job status pollers.
//!
//! One `JobPollers` owns every per-job timer for a scope (a window, a view,
//! a test). Each tracked job gets its own interval timer polling
//! `<kind>/status/{id}`; responses are normalized and upserted into the
//! store, and the timer stops itself on a terminal status.
//!
//! # Concurrency Model
//!
//! - Ticks are fire-and-forget: a slow request does not delay the next one.
//!   Overlapping responses are ordered by the job's [`JobFence`].
//! - Each timer runs on a child token of the scope token. Stopping a job
//!   cancels only its token; [`JobPollers::shutdown`] cancels them all.
//! - Cancelling never aborts a request in flight; its response is dropped
//!   when it arrives.
//! - The fence lock is held across the store write; the timers lock is
//!   never held across either.

mod fence;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use jobsync_core::{
    DownloadsBackend, JobKind, JobNotification, JobPatch, JobStatus, JobStatusUpdate, JobStore,
    StartDownloadRequest, SyncConfig, SyncError, SyncResult, normalize_job_status,
};
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use fence::{JobFence, Sequence};

/// Floor for the per-job cadence; a zero period would spin.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A running per-job timer.
struct JobTimer {
    kind: JobKind,
    cancel: CancellationToken,
    fence: Arc<JobFence>,
    /// Distinguishes a replaced timer from its successor.
    generation: u64,
}

/// Context handed to every status request of one timer.
#[derive(Clone)]
struct TickContext {
    job_id: String,
    kind: JobKind,
    cancel: CancellationToken,
    fence: Arc<JobFence>,
    generation: u64,
}

/// Owner of all per-job pollers in a scope.
pub struct JobPollers {
    store: Arc<JobStore>,
    backend: Arc<dyn DownloadsBackend>,
    interval_override: Option<Duration>,
    max_failures: u32,
    scope: CancellationToken,
    timers: Mutex<HashMap<String, JobTimer>>,
    notifications: broadcast::Sender<JobNotification>,
    generation: AtomicU64,
}

impl std::fmt::Debug for JobPollers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobPollers")
            .field("active", &self.active_count())
            .field("interval_override", &self.interval_override)
            .field("max_failures", &self.max_failures)
            .finish_non_exhaustive()
    }
}

impl JobPollers {
    /// Create an empty scope.
    pub fn new(
        store: Arc<JobStore>,
        backend: Arc<dyn DownloadsBackend>,
        config: &SyncConfig,
    ) -> Arc<Self> {
        let (notifications, _) = broadcast::channel(config.notification_capacity.max(1));
        Arc::new(Self {
            store,
            backend,
            interval_override: config.job_poll_interval,
            max_failures: config.max_job_poll_failures.max(1),
            scope: CancellationToken::new(),
            timers: Mutex::new(HashMap::new()),
            notifications,
            generation: AtomicU64::new(0),
        })
    }

    /// Start the download on the backend, then track the returned job.
    pub async fn submit(self: &Arc<Self>, request: &StartDownloadRequest) -> SyncResult<String> {
        let job_id = self.backend.start_download(request).await?;
        info!(job_id = %job_id, kind = %request.kind, source = %request.source, "Download submitted");

        if self.scope.is_cancelled() {
            debug!(job_id = %job_id, "Scope torn down before tracking submitted job");
            return Ok(job_id);
        }
        self.track(&job_id, request.kind, request.job_meta());
        Ok(job_id)
    }

    /// Record a new job as `queued` at 0% and start polling it.
    ///
    /// An existing timer for the same ID is replaced, never stacked.
    pub fn track(self: &Arc<Self>, job_id: &str, kind: JobKind, meta: Map<String, Value>) {
        if self.scope.is_cancelled() {
            return;
        }
        let mut patch = JobPatch::queued(kind);
        if !meta.is_empty() {
            patch = patch.with_meta(meta);
        }
        self.store.upsert_job(job_id, &patch);
        self.start_timer(job_id, kind);
    }

    /// Ask the backend to cancel a job, then stop its timer and mark it
    /// `cancelled`.
    ///
    /// If the backend refuses, the job keeps polling. A job that already
    /// reached a terminal status, before or during the request, is left as it
    /// is and no notification is sent.
    pub async fn cancel(&self, job_id: &str) -> SyncResult<()> {
        let kind = self
            .kind_of(job_id)
            .ok_or_else(|| SyncError::protocol(format!("unknown job: {job_id}")))?;
        if self.is_finished(job_id) {
            debug!(job_id = %job_id, "Job already finished, nothing to cancel");
            return Ok(());
        }

        self.backend.cancel_download(kind, job_id).await?;

        let timer = self.lock_timers().remove(job_id);
        let patch = JobPatch::new().with_status(JobStatus::Cancelled);
        let mark = || {
            if self.is_finished(job_id) {
                return false;
            }
            self.store.upsert_job(job_id, &patch);
            true
        };
        let cancelled = match timer {
            Some(timer) => timer.fence.close(|| {
                timer.cancel.cancel();
                mark()
            }),
            None => mark(),
        };
        if !cancelled {
            debug!(job_id = %job_id, "Job finished while cancelling");
            return Ok(());
        }

        info!(job_id = %job_id, %kind, "Download cancelled");
        self.notify(JobNotification::Cancelled {
            job_id: job_id.to_string(),
            kind,
        });
        Ok(())
    }

    /// Stop polling a job without touching its record.
    pub fn stop(&self, job_id: &str) -> bool {
        self.lock_timers().remove(job_id).is_some_and(|timer| {
            timer.cancel.cancel();
            true
        })
    }

    /// Stop every timer in this scope. Responses still in flight are dropped.
    pub fn shutdown(&self) {
        self.scope.cancel();
        let drained = self.lock_timers().drain().count();
        debug!(timers = drained, "Job pollers shut down");
    }

    /// Whether a timer is running for `job_id`.
    pub fn is_polling(&self, job_id: &str) -> bool {
        self.lock_timers().contains_key(job_id)
    }

    /// Number of running timers.
    pub fn active_count(&self) -> usize {
        self.lock_timers().len()
    }

    /// Receive job-scoped notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<JobNotification> {
        self.notifications.subscribe()
    }

    /// Poll cadence for a kind.
    pub fn poll_interval(&self, kind: JobKind) -> Duration {
        self.interval_override
            .unwrap_or_else(|| kind.default_poll_interval())
            .max(MIN_POLL_INTERVAL)
    }

    fn start_timer(self: &Arc<Self>, job_id: &str, kind: JobKind) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let ctx = TickContext {
            job_id: job_id.to_string(),
            kind,
            cancel: self.scope.child_token(),
            fence: Arc::new(JobFence::new()),
            generation,
        };

        let previous = self.lock_timers().insert(
            job_id.to_string(),
            JobTimer {
                kind,
                cancel: ctx.cancel.clone(),
                fence: Arc::clone(&ctx.fence),
                generation,
            },
        );
        if let Some(previous) = previous {
            previous.cancel.cancel();
            debug!(job_id = %job_id, "Replaced existing job poller");
        }

        let period = self.poll_interval(kind);
        debug!(job_id = %job_id, %kind, period_ms = period.as_millis(), "Job poller started");

        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    () = ctx.cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let Some(pollers) = weak.upgrade() else {
                    break;
                };
                let seq = ctx.fence.next_sequence();
                tokio::spawn(pollers.poll_once(ctx.clone(), seq));
            }
            debug!(job_id = %ctx.job_id, "Job poller stopped");
        });
    }

    async fn poll_once(self: Arc<Self>, ctx: TickContext, seq: Sequence) {
        let result = match self.backend.job_status(ctx.kind, &ctx.job_id).await {
            Ok(body) => normalize_job_status(&body),
            Err(e) => Err(e),
        };

        if ctx.cancel.is_cancelled() {
            debug!(job_id = %ctx.job_id, seq, "Dropping response for stopped poller");
            return;
        }

        match result {
            Ok(update) => self.apply_update(&ctx, seq, update),
            Err(err) => self.handle_poll_error(&ctx, seq, &err),
        }
    }

    fn apply_update(&self, ctx: &TickContext, seq: Sequence, update: JobStatusUpdate) {
        let status = update.status.clone();
        let error = update.error.clone();
        let patch = update.into_patch();

        let applied = ctx.fence.apply_if_newer(seq, &ctx.cancel, || {
            self.store.upsert_job(&ctx.job_id, &patch);
            if status.is_terminal() {
                ctx.cancel.cancel();
            }
        });
        if !applied {
            debug!(job_id = %ctx.job_id, seq, last_applied = ctx.fence.last_applied(), "Discarding stale job status");
            return;
        }
        ctx.fence.reset_failures();

        if !status.is_terminal() || !self.finish(ctx) {
            return;
        }

        let notification = if status.is_success() {
            info!(job_id = %ctx.job_id, kind = %ctx.kind, "Download completed");
            JobNotification::Completed {
                job_id: ctx.job_id.clone(),
                kind: ctx.kind,
            }
        } else if status.is_failure() {
            let error = error.unwrap_or_else(|| "download failed".to_string());
            warn!(job_id = %ctx.job_id, kind = %ctx.kind, error = %error, "Download failed");
            JobNotification::Failed {
                job_id: ctx.job_id.clone(),
                kind: ctx.kind,
                error,
            }
        } else {
            info!(job_id = %ctx.job_id, kind = %ctx.kind, "Download cancelled by backend");
            JobNotification::Cancelled {
                job_id: ctx.job_id.clone(),
                kind: ctx.kind,
            }
        };
        self.notify(notification);
    }

    fn handle_poll_error(&self, ctx: &TickContext, seq: Sequence, err: &SyncError) {
        let Some(failures) = ctx.fence.record_failure(seq) else {
            debug!(job_id = %ctx.job_id, seq, error = %err, "Ignoring stale job status failure");
            return;
        };
        if !err.is_protocol() && failures < self.max_failures {
            warn!(
                job_id = %ctx.job_id,
                attempt = failures,
                max_failures = self.max_failures,
                error = %err,
                "Job status poll failed, will retry on next tick"
            );
            return;
        }

        let message = err.to_string();
        let patch = JobPatch::new()
            .with_status(JobStatus::Error)
            .with_error(message.clone());
        let applied = ctx.fence.apply_if_newer(seq, &ctx.cancel, || {
            self.store.upsert_job(&ctx.job_id, &patch);
            ctx.cancel.cancel();
        });
        if !applied || !self.finish(ctx) {
            return;
        }

        warn!(job_id = %ctx.job_id, kind = %ctx.kind, error = %message, "Job status polling failed permanently");
        self.notify(JobNotification::Failed {
            job_id: ctx.job_id.clone(),
            kind: ctx.kind,
            error: message,
        });
    }

    /// Remove this timer if it is still the registered one for its job.
    ///
    /// Returns false only when a newer timer has replaced this one; a timer
    /// already removed by `stop` or `cancel` still owns the terminal status
    /// it applied.
    fn finish(&self, ctx: &TickContext) -> bool {
        let mut timers = self.lock_timers();
        let replaced = match timers.get(&ctx.job_id) {
            Some(timer) if timer.generation == ctx.generation => {
                timers.remove(&ctx.job_id);
                false
            }
            Some(_) => true,
            None => false,
        };
        ctx.cancel.cancel();
        !replaced
    }

    fn is_finished(&self, job_id: &str) -> bool {
        self.store.job(job_id).is_some_and(|job| job.is_terminal())
    }

    fn kind_of(&self, job_id: &str) -> Option<JobKind> {
        let tracked = self.lock_timers().get(job_id).map(|timer| timer.kind);
        tracked.or_else(|| self.store.job(job_id).and_then(|job| job.kind))
    }

    fn notify(&self, notification: JobNotification) {
        // No receivers is fine
        let _ = self.notifications.send(notification);
    }

    fn lock_timers(&self) -> std::sync::MutexGuard<'_, HashMap<String, JobTimer>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for JobPollers {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}
