//! Domain types for download job synchronization.
//!
//! Pure data types with no I/O or runtime dependencies.

pub mod connection;
pub mod items;
pub mod job;

pub use connection::{BANNER_ERROR_THRESHOLD, ConnectionPhase, ConnectionState};
pub use items::{Item, ItemsSnapshot};
pub use job::{Job, JobKind, JobPatch, JobStatus};
