//! Job-scoped notifications.
//!
//! Emitted once per job when its poller stops on a terminal status, so a
//! consumer can show a toast or badge for that job only.

use serde::{Deserialize, Serialize};

use crate::domain::JobKind;

/// Terminal outcome of a single polled job.
///
/// Serialized as a discriminated union:
///
/// ```typescript
/// type JobNotification =
///   | { type: "completed"; jobId: string; kind: string }
///   | { type: "failed"; jobId: string; kind: string; error: string }
///   | { type: "cancelled"; jobId: string; kind: string };
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum JobNotification {
    /// The job finished successfully.
    Completed {
        /// Backend job ID.
        job_id: String,
        /// Kind of download.
        kind: JobKind,
    },

    /// The job failed, or its status could no longer be fetched.
    Failed {
        /// Backend job ID.
        job_id: String,
        /// Kind of download.
        kind: JobKind,
        /// Failure message.
        error: String,
    },

    /// The job was cancelled on request.
    Cancelled {
        /// Backend job ID.
        job_id: String,
        /// Kind of download.
        kind: JobKind,
    },
}

impl JobNotification {
    /// ID of the job this notification is about.
    #[must_use]
    pub fn job_id(&self) -> &str {
        match self {
            Self::Completed { job_id, .. }
            | Self::Failed { job_id, .. }
            | Self::Cancelled { job_id, .. } => job_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialization() {
        let event = JobNotification::Failed {
            job_id: "abc".into(),
            kind: JobKind::Url,
            error: "disk full".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "failed");
        assert_eq!(json["jobId"], "abc");
        assert_eq!(json["kind"], "url");
        assert_eq!(event.job_id(), "abc");
    }
}
