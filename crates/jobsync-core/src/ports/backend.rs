//! Downloads backend port definition.
//!
//! This port abstracts the HTTP service that owns the actual downloads.
//! Implementations return raw JSON bodies; interpreting field-name variants
//! is the job of [`crate::normalize`], so every adapter shares one set of
//! precedence rules.
//!
//! # Design
//!
//! - Only core domain types and `serde_json::Value` in signatures
//! - Non-2xx and transport failures map to [`SyncError::Network`]
//! - `ok: false` bodies may be returned as-is; the normalizer turns them into
//!   [`SyncError::Protocol`]
//!
//! [`SyncError::Network`]: crate::SyncError::Network
//! [`SyncError::Protocol`]: crate::SyncError::Protocol

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::domain::JobKind;
use crate::error::SyncResult;

/// Request to start a new download on the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct StartDownloadRequest {
    /// Kind of download; selects the endpoint.
    pub kind: JobKind,
    /// Model ID for `hf` downloads, source URL otherwise.
    pub source: String,
    /// Destination directory on the backend, if not its default.
    pub target_dir: Option<String>,
    /// Extra metadata recorded on the job (category, display name, ...).
    pub meta: Map<String, Value>,
}

impl StartDownloadRequest {
    /// Download a `HuggingFace` model.
    pub fn huggingface(model_id: impl Into<String>) -> Self {
        Self::new(JobKind::Hf, model_id)
    }

    /// Download a URL as the given kind.
    pub fn url(kind: JobKind, url: impl Into<String>, dest_dir: impl Into<String>) -> Self {
        Self::new(kind, url).with_target_dir(dest_dir)
    }

    /// Create a request with required fields.
    pub fn new(kind: JobKind, source: impl Into<String>) -> Self {
        Self {
            kind,
            source: source.into(),
            target_dir: None,
            meta: Map::new(),
        }
    }

    /// Set the destination directory.
    #[must_use]
    pub fn with_target_dir(mut self, dir: impl Into<String>) -> Self {
        self.target_dir = Some(dir.into());
        self
    }

    /// Add a metadata entry.
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Metadata recorded on the job when it is tracked.
    #[must_use]
    pub fn job_meta(&self) -> Map<String, Value> {
        let mut meta = self.meta.clone();
        let source_key = if self.kind == JobKind::Hf {
            "modelId"
        } else {
            "url"
        };
        meta.insert(source_key.to_string(), Value::String(self.source.clone()));
        if let Some(ref dir) = self.target_dir {
            meta.insert("destDir".to_string(), Value::String(dir.clone()));
        }
        meta
    }
}

/// Port for the downloads backend.
#[async_trait]
pub trait DownloadsBackend: Send + Sync {
    /// `GET downloader/status`: the raw sync snapshot body.
    async fn downloader_status(&self) -> SyncResult<Value>;

    /// `GET <kind>/status/{job_id}`: the raw job status body.
    async fn job_status(&self, kind: JobKind, job_id: &str) -> SyncResult<Value>;

    /// Start a download and return its backend job ID.
    async fn start_download(&self, request: &StartDownloadRequest) -> SyncResult<String>;

    /// Ask the backend to cancel a running download.
    async fn cancel_download(&self, kind: JobKind, job_id: &str) -> SyncResult<()>;
}
