//! Job store: the single source of truth for download sync state.
//!
//! # Design
//!
//! - One constructible instance per scope, shared as `Arc<JobStore>`; no
//!   global state, so tests get isolated stores.
//! - Only [`JobStore::set_items`] and [`JobStore::upsert_job`] write. Readers
//!   get an immutable `Arc<SyncState>` snapshot.
//! - Every write notifies all subscribers synchronously, after the write
//!   lock is released, with the snapshot that write produced.

mod subscribers;

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::domain::{ItemsSnapshot, Job, JobPatch};

use subscribers::Registry;
pub use subscribers::{Listener, SubscriberId, Subscription};

/// Full store state handed to readers and subscribers.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    /// Jobs keyed by ID, in creation order.
    pub jobs: IndexMap<String, Job>,
    /// Items from the last successful downloader sync.
    pub items: ItemsSnapshot,
    /// When `items` was last replaced.
    pub last_sync: Option<DateTime<Utc>>,
}

impl SyncState {
    /// Look up a job by ID.
    #[must_use]
    pub fn job(&self, id: &str) -> Option<&Job> {
        self.jobs.get(id)
    }

    /// Jobs that have not reached a terminal status.
    pub fn active_jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values().filter(|job| !job.is_terminal())
    }
}

/// In-process store with synchronous pub/sub.
pub struct JobStore {
    state: RwLock<Arc<SyncState>>,
    subscribers: Arc<Registry<SyncState>>,
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for JobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobStore")
            .field("jobs", &self.state().jobs.len())
            .field("subscribers", &self.subscriber_count())
            .finish_non_exhaustive()
    }
}

impl JobStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(Arc::new(SyncState::default())),
            subscribers: Arc::new(Registry::new()),
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> Arc<SyncState> {
        Arc::clone(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Current record for `id`, if any.
    pub fn job(&self, id: &str) -> Option<Job> {
        self.state().job(id).cloned()
    }

    /// Replace the items snapshot from an untrusted `items` object.
    ///
    /// Every item is sanitized; a missing or malformed bucket becomes empty.
    /// Records the sync time and notifies subscribers.
    pub fn set_items(&self, items: &Value) {
        let snapshot = ItemsSnapshot::from_value(items);
        debug!(
            datasets = snapshot.datasets.len(),
            models = snapshot.models.len(),
            tts = snapshot.tts.len(),
            "Replacing items snapshot"
        );

        self.mutate(|state| {
            state.items = snapshot;
            state.last_sync = Some(Utc::now());
        });
    }

    /// Merge `patch` into the job `id`, creating it if absent.
    ///
    /// Progress is re-clamped after the merge; out-of-range or regressive
    /// values are accepted, never rejected. Notifies subscribers and returns
    /// the resulting record.
    pub fn upsert_job(&self, id: &str, patch: &JobPatch) -> Job {
        let mut result = None;
        self.mutate(|state| {
            let job = state
                .jobs
                .entry(id.to_string())
                .or_insert_with(|| Job::new(id));
            job.apply(patch);
            result = Some(job.clone());
        });
        result.unwrap_or_else(|| Job::new(id))
    }

    /// Register a listener called with the full state after every mutation.
    pub fn subscribe<F>(&self, listener: F) -> Subscription<SyncState>
    where
        F: Fn(&SyncState) + Send + Sync + 'static,
    {
        let id = self.subscribers.add(Arc::new(listener));
        Subscription::new(id, Arc::downgrade(&self.subscribers))
    }

    /// Number of registered listeners.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn mutate(&self, f: impl FnOnce(&mut SyncState)) {
        let snapshot = {
            let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
            f(Arc::make_mut(&mut guard));
            Arc::clone(&guard)
        };
        self.subscribers.emit(&snapshot);
    }
}
