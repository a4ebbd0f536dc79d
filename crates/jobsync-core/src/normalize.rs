//! Normalization of backend payloads into canonical DTOs.
//!
//! Different backend routes name the same fields differently (`progress`
//! vs `pct`, `eta` vs `etaSec`) and some wrap the payload in an
//! `{ ok, data }` envelope. This module is the only place that knows about
//! those variants.
//!
//! # Precedence
//!
//! For every canonical field the first key that is present and not `null`
//! wins; its value is then sanitized. A present-but-garbage value does not
//! fall through to the next key.
//!
//! | Field      | Keys, in order          | Default   |
//! |------------|-------------------------|-----------|
//! | `progress` | `progress`, `pct`       | `0`       |
//! | `eta`      | `etaSec`, `eta`         | none      |
//! | `speed`    | `speedMbps`, `speed`    | none      |
//! | `error`    | `error`, `message`      | none      |
//! | `status`   | `status`                | `pending` |

use serde_json::Value;

use crate::domain::{JobPatch, JobStatus};
use crate::error::{SyncError, SyncResult};
use crate::sanitize::{num_opt, progress};

/// Keys for the progress percentage.
pub const PROGRESS_KEYS: &[&str] = &["progress", "pct"];

/// Keys for the estimated seconds remaining.
pub const ETA_KEYS: &[&str] = &["etaSec", "eta"];

/// Keys for the transfer speed.
pub const SPEED_KEYS: &[&str] = &["speedMbps", "speed"];

/// Keys for a failure message.
pub const ERROR_KEYS: &[&str] = &["error", "message"];

/// Canonical job status reported by a per-job status endpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct JobStatusUpdate {
    /// Reported status (`pending` if absent).
    pub status: JobStatus,
    /// Progress percentage in `[0, 100]`.
    pub progress: f64,
    /// Estimated seconds remaining.
    pub eta: Option<f64>,
    /// Speed in Mbps.
    pub speed: Option<f64>,
    /// Failure message.
    pub error: Option<String>,
}

impl JobStatusUpdate {
    /// Convert into a store patch.
    ///
    /// A successful terminal status forces progress to 100.
    #[must_use]
    pub fn into_patch(self) -> JobPatch {
        let progress = if self.status.is_success() {
            100.0
        } else {
            self.progress
        };
        JobPatch {
            kind: None,
            status: Some(self.status),
            progress: Some(progress),
            eta: self.eta,
            speed: self.speed,
            error: self.error,
            meta: None,
        }
    }
}

/// Fail with a protocol error if the body reports `ok: false`.
pub fn check_envelope(body: &Value) -> SyncResult<()> {
    if body.get("ok") == Some(&Value::Bool(false)) {
        let message = first_string(body, ERROR_KEYS)
            .unwrap_or("backend reported failure")
            .to_string();
        return Err(SyncError::protocol(message));
    }
    Ok(())
}

/// Fail with a protocol error unless the body is a JSON object.
///
/// An empty body reaches here as `null`; it is never a successful read.
pub fn require_object(body: &Value) -> SyncResult<()> {
    if body.is_object() {
        Ok(())
    } else {
        Err(SyncError::protocol("empty response from server"))
    }
}

/// The payload of a response: `data` if it is an object, else the body.
pub fn payload(body: &Value) -> &Value {
    match body.get("data") {
        Some(data @ Value::Object(_)) => data,
        _ => body,
    }
}

/// Normalize a per-job status response.
pub fn normalize_job_status(body: &Value) -> SyncResult<JobStatusUpdate> {
    require_object(body)?;
    check_envelope(body)?;
    let data = payload(body);

    let status = data
        .get("status")
        .and_then(Value::as_str)
        .map_or(JobStatus::Pending, JobStatus::parse);

    Ok(JobStatusUpdate {
        status,
        progress: first_present(data, PROGRESS_KEYS).map_or(0.0, progress),
        eta: first_present(data, ETA_KEYS).and_then(num_opt),
        speed: first_present(data, SPEED_KEYS).and_then(num_opt),
        error: first_string(data, ERROR_KEYS).map(str::to_string),
    })
}

/// Extract the `items` object of a `downloader/status` response.
///
/// An `ok` object without items yields `null`, which the store treats as an
/// empty snapshot. A body that is not an object is an error.
pub fn extract_items(body: &Value) -> SyncResult<Value> {
    require_object(body)?;
    check_envelope(body)?;
    Ok(body
        .get("items")
        .or_else(|| payload(body).get("items"))
        .cloned()
        .unwrap_or(Value::Null))
}

/// Extract the `jobId` of a start-download response.
pub fn extract_job_id(body: &Value) -> SyncResult<String> {
    check_envelope(body)?;
    let raw = body.get("jobId").or_else(|| payload(body).get("jobId"));
    match raw {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(SyncError::protocol("response did not include a job id")),
    }
}

fn first_present<'a>(data: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| data.get(key))
        .find(|value| !value.is_null())
}

fn first_string<'a>(data: &'a Value, keys: &[&str]) -> Option<&'a str> {
    first_present(data, keys).and_then(Value::as_str)
}
