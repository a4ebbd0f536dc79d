#![doc = include_str!("../README.md")]
#![deny(unused_crate_dependencies)]

pub mod backoff;
pub mod health_monitor;
pub mod job_poller;
pub mod scheduler;

pub use backoff::BackoffPolicy;
pub use health_monitor::ConnectionHealthMonitor;
pub use job_poller::{JobFence, JobPollers, Sequence};
pub use scheduler::PollingScheduler;

// Dev-dependencies used only by the integration tests
#[cfg(test)]
use async_trait as _;
#[cfg(test)]
use mockall as _;
#[cfg(test)]
use tokio_test as _;
