//! Sync error types.
//!
//! These errors cross the port boundary between adapters (HTTP) and the
//! runtime loops. They are serializable and do not wrap foreign error types;
//! adapters capture the message (and HTTP status, if any) as plain data.
//!
//! Malformed numeric fields are never an error: the sanitizer coerces them.
//! A panicking store subscriber is never an error either: the store catches
//! and logs it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Error type for backend sync operations.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncError {
    /// The request failed in transport or returned a non-2xx status.
    #[error("Network error: {message}")]
    Network {
        /// Detailed error message.
        message: String,
        /// HTTP status code if available.
        #[serde(skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
    },

    /// The backend answered, but the body reported `ok: false`.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Error text reported by the backend.
        message: String,
    },

    /// The response body could not be decoded as JSON.
    #[error("Decode error: {message}")]
    Decode {
        /// Detailed error message.
        message: String,
    },
}

impl SyncError {
    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            status_code: None,
        }
    }

    /// Create a network error with HTTP status code.
    pub fn network_with_status(message: impl Into<String>, status_code: u16) -> Self {
        Self::Network {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Whether the backend itself rejected the request (`ok: false`).
    #[must_use]
    pub const fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol { .. })
    }

    /// HTTP status code, if the error carries one.
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Network { status_code, .. } => *status_code,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SyncError::network_with_status("GET downloader/status returned 503", 503);
        assert!(err.to_string().contains("503"));
        assert_eq!(err.status_code(), Some(503));

        let err = SyncError::protocol("Job not found");
        assert_eq!(err.to_string(), "Protocol error: Job not found");
        assert!(err.is_protocol());
        assert_eq!(err.status_code(), None);
    }

    #[test]
    fn test_serialization() {
        let err = SyncError::network("connection refused");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"kind\":\"network\""));
        assert!(!json.contains("status_code"));

        let back: SyncError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }
}
