//! Job records and the patches that mutate them.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::sanitize::{PROGRESS_MAX, PROGRESS_MIN, clamp_f64};

/// Kind of download a job represents.
///
/// The kind selects the backend endpoints used for status, start and cancel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Model download from `HuggingFace`.
    Hf,
    /// Download of an arbitrary URL.
    Url,
    /// Dataset download.
    Dataset,
    /// Text-to-speech model download.
    Tts,
}

impl JobKind {
    /// All job kinds.
    pub const ALL: [Self; 4] = [Self::Hf, Self::Url, Self::Dataset, Self::Tts];

    /// Wire name of this kind (the job record's `type`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Hf => "hf",
            Self::Url => "url",
            Self::Dataset => "dataset",
            Self::Tts => "tts",
        }
    }

    /// Path segment of this kind's endpoints (`<segment>/status/{id}`).
    #[must_use]
    pub const fn path_segment(&self) -> &'static str {
        match self {
            Self::Hf => "hf",
            Self::Url => "url",
            Self::Dataset => "datasets",
            Self::Tts => "tts",
        }
    }

    /// Default per-job polling cadence.
    ///
    /// Model downloads report slowly; everything else polls every second.
    #[must_use]
    pub const fn default_poll_interval(&self) -> Duration {
        match self {
            Self::Hf => Duration::from_millis(2000),
            Self::Url | Self::Dataset | Self::Tts => Duration::from_millis(1000),
        }
    }

    /// Parse from the wire name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a job as last reported by the backend.
///
/// The backend's vocabulary is open-ended; unknown values are preserved in
/// [`JobStatus::Other`] rather than rejected.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum JobStatus {
    /// Submitted, not yet started.
    Queued,
    /// Reported when the backend returns no status at all.
    Pending,
    /// Transfer in progress.
    Downloading,
    /// Finished successfully.
    Done,
    /// Finished successfully.
    Completed,
    /// Finished successfully.
    Finished,
    /// Failed.
    Error,
    /// Cancelled on request.
    Cancelled,
    /// Any other backend status, kept verbatim.
    Other(String),
}

impl JobStatus {
    /// Convert to the wire string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "queued",
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Done => "done",
            Self::Completed => "completed",
            Self::Finished => "finished",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
            Self::Other(s) => s,
        }
    }

    /// Parse from the wire string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "queued" => Self::Queued,
            "pending" => Self::Pending,
            "downloading" => Self::Downloading,
            "done" => Self::Done,
            "completed" => Self::Completed,
            "finished" => Self::Finished,
            "error" => Self::Error,
            "cancelled" => Self::Cancelled,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether the job finished successfully.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Done | Self::Completed | Self::Finished)
    }

    /// Whether the job failed.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Error)
    }

    /// Whether no further status changes are expected.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.is_success() || self.is_failure() || matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for JobStatus {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl Serialize for JobStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for JobStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// A tracked download job.
///
/// Identity is `id`. Records are created by the first upsert and mutated by
/// every later one; they are never removed from the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Backend job ID.
    pub id: String,
    /// Kind of download.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<JobKind>,
    /// Last known status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    /// Progress percentage, always finite and within `[0, 100]`.
    pub progress: f64,
    /// Estimated seconds remaining.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<f64>,
    /// Transfer speed in Mbps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Error message reported for a failed job.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Opaque submission metadata (source URL, target directory, ...).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
    /// When an upsert last changed this record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create an empty record for `id`.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: None,
            status: None,
            progress: PROGRESS_MIN,
            eta: None,
            speed: None,
            error: None,
            meta: Map::new(),
            updated_at: None,
        }
    }

    /// Shallow-merge `patch` over this record and re-clamp progress.
    ///
    /// Fields absent from the patch are kept. Meta keys are merged one level
    /// deep. `updated_at` only moves when the merge changed something, so
    /// applying the same patch twice yields the same record.
    pub fn apply(&mut self, patch: &JobPatch) {
        let mut next = self.clone();

        if let Some(kind) = patch.kind {
            next.kind = Some(kind);
        }
        if let Some(ref status) = patch.status {
            next.status = Some(status.clone());
        }
        if let Some(eta) = patch.eta {
            next.eta = Some(eta);
        }
        if let Some(speed) = patch.speed {
            next.speed = Some(speed);
        }
        if let Some(ref error) = patch.error {
            next.error = Some(error.clone());
        }
        if let Some(ref meta) = patch.meta {
            next.meta
                .extend(meta.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        next.progress = clamp_f64(
            patch.progress.unwrap_or(self.progress),
            PROGRESS_MIN,
            PROGRESS_MAX,
        );

        if next != *self {
            next.updated_at = Some(Utc::now());
            *self = next;
        }
    }

    /// Whether the job reached a terminal status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.as_ref().is_some_and(JobStatus::is_terminal)
    }
}

/// A partial update to a [`Job`].
///
/// `None` fields leave the record untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JobPatch {
    /// Kind of download.
    pub kind: Option<JobKind>,
    /// New status.
    pub status: Option<JobStatus>,
    /// New progress; clamped on apply.
    pub progress: Option<f64>,
    /// New ETA in seconds.
    pub eta: Option<f64>,
    /// New speed in Mbps.
    pub speed: Option<f64>,
    /// Error message.
    pub error: Option<String>,
    /// Meta entries to merge.
    pub meta: Option<Map<String, Value>>,
}

impl JobPatch {
    /// Create an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Patch for a freshly submitted job: `queued` at 0%.
    #[must_use]
    pub fn queued(kind: JobKind) -> Self {
        Self::new()
            .with_kind(kind)
            .with_status(JobStatus::Queued)
            .with_progress(PROGRESS_MIN)
    }

    /// Set the kind.
    #[must_use]
    pub const fn with_kind(mut self, kind: JobKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Set the status.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<JobStatus>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Set the progress.
    #[must_use]
    pub const fn with_progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Set the error message.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Set the meta entries to merge.
    #[must_use]
    pub fn with_meta(mut self, meta: Map<String, Value>) -> Self {
        self.meta = Some(meta);
        self
    }
}
