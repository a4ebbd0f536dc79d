//! Shared test backends for jobsync-runtime integration tests.

// Each test binary uses a different subset of these helpers
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use jobsync_core::{DownloadsBackend, JobKind, StartDownloadRequest, SyncError, SyncResult};
use mockall::mock;
use serde_json::{Value, json};

mock! {
    pub Backend {}

    #[async_trait]
    impl DownloadsBackend for Backend {
        async fn downloader_status(&self) -> SyncResult<Value>;
        async fn job_status(&self, kind: JobKind, job_id: &str) -> SyncResult<Value>;
        async fn start_download(&self, request: &StartDownloadRequest) -> SyncResult<String>;
        async fn cancel_download(&self, kind: JobKind, job_id: &str) -> SyncResult<()>;
    }
}

/// One scripted backend answer, delivered after `delay`.
#[derive(Clone, Debug)]
pub struct Reply {
    pub delay: Duration,
    pub result: SyncResult<Value>,
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Ok(body),
        }
    }

    pub fn err(error: SyncError) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Err(error),
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Scripted in-memory backend.
///
/// Replies are consumed in order; the last reply of a script repeats
/// forever. Unscripted endpoints answer with an empty success.
#[derive(Default)]
pub struct FakeBackend {
    downloader: Mutex<VecDeque<Reply>>,
    jobs: Mutex<HashMap<String, VecDeque<Reply>>>,
    downloader_calls: AtomicUsize,
    job_calls: Mutex<HashMap<String, usize>>,
    cancelled: Mutex<Vec<(JobKind, String)>>,
    started: Mutex<Vec<StartDownloadRequest>>,
    reject_cancel: AtomicBool,
    cancel_delay: Mutex<Duration>,
    next_id: AtomicU64,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script_downloader(&self, replies: impl IntoIterator<Item = Reply>) {
        self.downloader.lock().unwrap().extend(replies);
    }

    pub fn script_job(&self, job_id: &str, replies: impl IntoIterator<Item = Reply>) {
        self.jobs
            .lock()
            .unwrap()
            .entry(job_id.to_string())
            .or_default()
            .extend(replies);
    }

    pub fn reject_cancel(&self) {
        self.reject_cancel.store(true, Ordering::SeqCst);
    }

    pub fn delay_cancel(&self, delay: Duration) {
        *self.cancel_delay.lock().unwrap() = delay;
    }

    pub fn downloader_calls(&self) -> usize {
        self.downloader_calls.load(Ordering::SeqCst)
    }

    pub fn job_calls(&self, job_id: &str) -> usize {
        self.job_calls
            .lock()
            .unwrap()
            .get(job_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn cancelled(&self) -> Vec<(JobKind, String)> {
        self.cancelled.lock().unwrap().clone()
    }

    pub fn started(&self) -> Vec<StartDownloadRequest> {
        self.started.lock().unwrap().clone()
    }

    fn take(queue: &mut VecDeque<Reply>) -> Option<Reply> {
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

async fn deliver(reply: Option<Reply>) -> SyncResult<Value> {
    let Some(reply) = reply else {
        return Ok(json!({ "ok": true }));
    };
    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }
    reply.result
}

#[async_trait]
impl DownloadsBackend for FakeBackend {
    async fn downloader_status(&self) -> SyncResult<Value> {
        self.downloader_calls.fetch_add(1, Ordering::SeqCst);
        let reply = Self::take(&mut self.downloader.lock().unwrap());
        deliver(reply).await
    }

    async fn job_status(&self, _kind: JobKind, job_id: &str) -> SyncResult<Value> {
        *self
            .job_calls
            .lock()
            .unwrap()
            .entry(job_id.to_string())
            .or_default() += 1;
        let reply = self
            .jobs
            .lock()
            .unwrap()
            .get_mut(job_id)
            .and_then(Self::take);
        deliver(reply).await
    }

    async fn start_download(&self, request: &StartDownloadRequest) -> SyncResult<String> {
        self.started.lock().unwrap().push(request.clone());
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("job-{n}"))
    }

    async fn cancel_download(&self, kind: JobKind, job_id: &str) -> SyncResult<()> {
        let delay = *self.cancel_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.reject_cancel.load(Ordering::SeqCst) {
            return Err(SyncError::protocol("cannot cancel"));
        }
        self.cancelled
            .lock()
            .unwrap()
            .push((kind, job_id.to_string()));
        Ok(())
    }
}

/// A `downloader/status` body with one model.
pub fn status_body() -> Value {
    json!({
        "ok": true,
        "items": {
            "datasets": [],
            "models": [{ "id": "m1", "progress": "55", "size": 1024 }],
            "tts": []
        }
    })
}

pub fn refused() -> SyncError {
    SyncError::network("connection refused")
}
