#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod normalize;
pub mod ports;
pub mod sanitize;
pub mod store;

// Re-export commonly used types for convenience
pub use config::{ConfigError, SyncConfig};
pub use domain::{
    ConnectionPhase, ConnectionState, Item, ItemsSnapshot, Job, JobKind, JobPatch, JobStatus,
};
pub use error::{SyncError, SyncResult};
pub use events::JobNotification;
pub use normalize::{JobStatusUpdate, normalize_job_status};
pub use ports::{DownloadsBackend, StartDownloadRequest};
pub use store::{JobStore, Subscription, SyncState};
