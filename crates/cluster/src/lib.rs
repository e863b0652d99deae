//! primebench cluster runtime
//!
//! Runs prime generation and factorization batches over a pool of worker
//! threads and reports how fast the pool got through them.
//!
//! Key pieces:
//! - Thread-per-worker actors reached through cloneable handles
//! - Scatter-gather distribution with partial-failure reporting
//! - Background resource sampling with an explicit lifecycle
//! - Throughput history and cluster-wide statistics
//! - JSON run reports

pub mod config;
pub mod distributor;
pub mod monitor;
pub mod report;
pub mod stats;
pub mod suite;
pub mod throughput;
pub mod worker;

pub use config::{ConfigError, RunConfig};
pub use distributor::{
    DistributionError, FactorizationBatch, FactorizationOutcome, GenerationBatch, TaskFailure,
    WorkDistributor, partition,
};
pub use monitor::{MetricsSource, MonitorError, ResourceMonitor, ResourceSummary, SysinfoSource};
pub use report::ReportError;
pub use stats::{ClusterReport, StatsAggregator, WorkSummary};
pub use suite::{ClusterSuite, FactorizationRecord, FactorizationSource, GenerationRecord, RunReport};
pub use throughput::{OperationKind, ThroughputRecorder, ThroughputSample, ThroughputSummary};
pub use worker::{WorkerError, WorkerHandle, WorkerNode, WorkerPool, WorkerSettings, WorkerStats};

/// Cluster result type
pub type Result<T> = std::result::Result<T, ClusterError>;

/// Cluster error types
#[derive(thiserror::Error, Debug)]
pub enum ClusterError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Distribution error: {0}")]
    Distribution(#[from] DistributionError),

    #[error("Monitor error: {0}")]
    Monitor(#[from] MonitorError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    #[error("Task error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Interrupted")]
    Interrupted,
}
