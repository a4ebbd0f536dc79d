//! Port definitions (traits) for external collaborators.
//!
//! Adapter crates implement these; the runtime depends only on the traits.

mod backend;

pub use backend::{DownloadsBackend, StartDownloadRequest};
