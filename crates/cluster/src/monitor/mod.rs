//! Resource monitoring module
//!
//! This module samples CPU, memory, network and disk usage in the
//! background while batches run, and summarizes the collected history.

pub mod resources;
pub mod sampler;

use thiserror::Error;

pub use resources::{DiskCounters, MetricsSource, NetworkCounters, ResourceReading, SysinfoSource};
pub use sampler::{ResourceMonitor, ResourceSample, ResourceSummary, summarize};

/// Monitoring errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    #[error("Monitor is already running")]
    AlreadyRunning,

    #[error("Monitor needs a tokio runtime")]
    NoRuntime,

    #[error("Failed to collect metrics: {0}")]
    Collect(String),

    #[error("Monitor task failed: {0}")]
    Join(String),
}
