//! Internal error types for the HTTP adapter.
//!
//! These errors are mapped to [`SyncError`] at the port boundary.

use jobsync_core::SyncError;
use thiserror::Error;

/// Result type alias for HTTP adapter operations.
pub type HttpResult<T> = Result<T, HttpError>;

/// Errors raised by the HTTP adapter.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The backend answered with a non-2xx status.
    #[error("Request to {url} failed with status {status}")]
    Status {
        /// HTTP status code
        status: u16,
        /// The URL that was requested
        url: String,
    },

    /// Transport failure: connect, timeout, TLS, or client construction.
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The configured base URL could not be parsed or joined.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A job ID that cannot be used as a path segment.
    #[error("Invalid job id: {0:?}")]
    InvalidJobId(String),

    /// The response body was not valid JSON.
    #[error("Response body is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<HttpError> for SyncError {
    fn from(err: HttpError) -> Self {
        let message = err.to_string();
        match err {
            HttpError::Status { status, .. } => Self::network_with_status(message, status),
            HttpError::Transport(e) if e.is_decode() => Self::decode(message),
            HttpError::Transport(_) | HttpError::InvalidUrl(_) => Self::network(message),
            HttpError::InvalidJobId(_) => Self::protocol(message),
            HttpError::Decode(_) => Self::decode(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_maps_to_network_with_code() {
        let err: SyncError = HttpError::Status {
            status: 502,
            url: "http://localhost:3001/api/downloader/status".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), Some(502));
        assert!(err.to_string().contains("502"));
        assert!(!err.is_protocol());
    }

    #[test]
    fn test_bad_json_maps_to_decode() {
        let Err(json_err) = serde_json::from_str::<serde_json::Value>("<html>") else {
            panic!("expected a parse error");
        };
        let err: SyncError = HttpError::from(json_err).into();
        assert!(matches!(err, SyncError::Decode { .. }));
    }

    #[test]
    fn test_invalid_job_id_maps_to_protocol() {
        let err: SyncError = HttpError::InvalidJobId("..".to_string()).into();
        assert!(err.is_protocol());
    }
}
