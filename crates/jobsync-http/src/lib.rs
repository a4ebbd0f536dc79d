#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

mod client;
mod config;
mod endpoints;
mod error;

// ============================================================================
// Public API
// ============================================================================

pub use client::ReqwestBackend;
pub use config::HttpBackendConfig;
pub use error::{HttpError, HttpResult};

// Silence unused dev-dependency warnings
#[cfg(test)]
use tokio_test as _;
