//! Cluster-wide statistics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::monitor::ResourceSummary;
use crate::throughput::ThroughputSummary;
use crate::worker::WorkerStats;

/// Totals over every worker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkSummary {
    pub total_primes_found: u64,
    pub total_factorizations: u64,
    /// Seconds
    pub total_work_time: f64,
    pub average_efficiency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterReport {
    pub cluster_size: usize,
    pub total_workers: usize,
    pub worker_stats: Vec<WorkerStats>,
    pub summary: WorkSummary,
    pub throughput: ThroughputSummary,
    /// Absent when no resource sample was collected
    pub monitoring: Option<ResourceSummary>,
    pub generated_at: DateTime<Utc>,
}

impl ClusterReport {
    /// Log the end-of-run performance report
    pub fn log_summary(&self) {
        let summary = &self.summary;
        info!(
            "Workers: {}/{}, primes found: {}, factorizations: {}, work time: {:.2}s, average efficiency: {:.2}%",
            self.total_workers,
            self.cluster_size,
            summary.total_primes_found,
            summary.total_factorizations,
            summary.total_work_time,
            summary.average_efficiency * 100.0
        );

        let generation = &self.throughput.prime_generation;
        if generation.batches > 0 {
            info!(
                "Prime generation: {} batches, {} primes, average {:.2} primes/s, peak {:.2} primes/s",
                generation.batches,
                generation.total_successful,
                generation.avg_throughput,
                generation.max_throughput
            );
        }

        let factorization = &self.throughput.factorization;
        if factorization.batches > 0 {
            info!(
                "Factorization: {} batches, {} completed, average {:.2} numbers/s, peak {:.2} numbers/s",
                factorization.batches,
                factorization.total_successful,
                factorization.avg_throughput,
                factorization.max_throughput
            );
        }

        match &self.monitoring {
            Some(monitoring) => info!(
                "Monitoring: {:.1}s over {} samples, CPU avg {:.1}% peak {:.1}%, memory avg {:.1}% peak {:.1}%",
                monitoring.duration,
                monitoring.sample_count,
                monitoring.avg_cpu_percent,
                monitoring.max_cpu_percent,
                monitoring.avg_memory_percent,
                monitoring.max_memory_percent
            ),
            None => info!("Monitoring: no samples collected"),
        }
    }
}

pub struct StatsAggregator;

impl StatsAggregator {
    /// Merge worker snapshots with throughput and resource summaries.
    ///
    /// `cluster_size` is the configured pool size; `total_workers` counts
    /// the snapshots actually gathered.
    pub fn aggregate(
        cluster_size: usize,
        worker_stats: Vec<WorkerStats>,
        throughput: ThroughputSummary,
        monitoring: Option<ResourceSummary>,
    ) -> ClusterReport {
        let summary = Self::summarize(&worker_stats);

        ClusterReport {
            cluster_size,
            total_workers: worker_stats.len(),
            worker_stats,
            summary,
            throughput,
            monitoring,
            generated_at: Utc::now(),
        }
    }

    fn summarize(worker_stats: &[WorkerStats]) -> WorkSummary {
        if worker_stats.is_empty() {
            return WorkSummary::default();
        }

        WorkSummary {
            total_primes_found: worker_stats.iter().map(|s| s.primes_found).sum(),
            total_factorizations: worker_stats.iter().map(|s| s.factorizations_completed).sum(),
            total_work_time: worker_stats.iter().map(|s| s.total_work_time).sum(),
            average_efficiency: worker_stats.iter().map(|s| s.efficiency).sum::<f64>()
                / worker_stats.len() as f64,
        }
    }
}
