//! Batch throughput bookkeeping

use std::time::Duration;

use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Kind of batch a sample describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    PrimeGeneration,
    Factorization,
}

/// Throughput of one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThroughputSample {
    pub operation: OperationKind,
    /// Requested bit length, or the widest input of a factorization batch
    pub bits: u64,
    pub total_operations: usize,
    pub successful_operations: usize,
    /// Seconds
    pub total_time: f64,
    /// Successful operations per second
    pub throughput: f64,
    /// Seconds per successful operation
    pub avg_time_per_operation: f64,
    pub cluster_size: usize,
    pub timestamp: DateTime<Utc>,
}

impl ThroughputSample {
    fn new(
        operation: OperationKind,
        bits: u64,
        total_operations: usize,
        elapsed: Duration,
        succeeded: usize,
        cluster_size: usize,
    ) -> Self {
        let successful_operations = succeeded.min(total_operations);
        let total_time = elapsed.as_secs_f64();

        let throughput = if total_time > 0.0 {
            successful_operations as f64 / total_time
        } else {
            0.0
        };
        let avg_time_per_operation = if successful_operations > 0 {
            total_time / successful_operations as f64
        } else {
            0.0
        };

        Self {
            operation,
            bits,
            total_operations,
            successful_operations,
            total_time,
            throughput,
            avg_time_per_operation,
            cluster_size,
            timestamp: Utc::now(),
        }
    }
}

/// Per-kind aggregate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationSummary {
    pub batches: usize,
    pub avg_throughput: f64,
    pub max_throughput: f64,
    pub total_successful: usize,
}

impl OperationSummary {
    fn from_samples<'a>(samples: impl Iterator<Item = &'a ThroughputSample>) -> Self {
        let mut summary = Self::default();
        let mut throughput_sum = 0.0;

        for sample in samples {
            summary.batches += 1;
            summary.total_successful += sample.successful_operations;
            summary.max_throughput = summary.max_throughput.max(sample.throughput);
            throughput_sum += sample.throughput;
        }

        if summary.batches > 0 {
            summary.avg_throughput = throughput_sum / summary.batches as f64;
        }
        summary
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThroughputSummary {
    pub total_batches: usize,
    pub prime_generation: OperationSummary,
    pub factorization: OperationSummary,
}

/// Append-only history of batch throughput
#[derive(Debug, Default)]
pub struct ThroughputRecorder {
    history: RwLock<Vec<ThroughputSample>>,
}

impl ThroughputRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_generation(
        &self,
        bits: u64,
        requested: usize,
        elapsed: Duration,
        succeeded: usize,
        cluster_size: usize,
    ) -> ThroughputSample {
        let sample = ThroughputSample::new(
            OperationKind::PrimeGeneration,
            bits,
            requested,
            elapsed,
            succeeded,
            cluster_size,
        );
        self.push(sample)
    }

    pub fn record_factorization(
        &self,
        numbers: &[BigUint],
        elapsed: Duration,
        succeeded: usize,
        cluster_size: usize,
    ) -> ThroughputSample {
        let bits = numbers.iter().map(BigUint::bits).max().unwrap_or(0);
        let sample = ThroughputSample::new(
            OperationKind::Factorization,
            bits,
            numbers.len(),
            elapsed,
            succeeded,
            cluster_size,
        );
        self.push(sample)
    }

    fn push(&self, sample: ThroughputSample) -> ThroughputSample {
        debug!(
            operation = ?sample.operation,
            bits = sample.bits,
            throughput = sample.throughput,
            "throughput recorded"
        );
        self.history.write().push(sample.clone());
        sample
    }

    pub fn samples(&self) -> Vec<ThroughputSample> {
        self.history.read().clone()
    }

    pub fn summary(&self) -> ThroughputSummary {
        let history = self.history.read();
        let samples: &[ThroughputSample] = &history;
        let of_kind =
            move |kind: OperationKind| samples.iter().filter(move |s| s.operation == kind);

        ThroughputSummary {
            total_batches: samples.len(),
            prime_generation: OperationSummary::from_samples(of_kind(OperationKind::PrimeGeneration)),
            factorization: OperationSummary::from_samples(of_kind(OperationKind::Factorization)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_generation_sample() {
        let recorder = ThroughputRecorder::new();
        let sample = recorder.record_generation(512, 10, Duration::from_secs(2), 8, 4);

        assert_eq!(sample.operation, OperationKind::PrimeGeneration);
        assert_eq!(sample.successful_operations, 8);
        assert_eq!(sample.throughput, 4.0);
        assert_eq!(sample.avg_time_per_operation, 0.25);
        assert_eq!(sample.cluster_size, 4);
    }

    #[test]
    fn test_success_clamped_to_requested() {
        let recorder = ThroughputRecorder::new();
        let sample = recorder.record_generation(64, 3, Duration::from_secs(1), 7, 1);
        assert_eq!(sample.successful_operations, 3);
    }

    #[test]
    fn test_zero_elapsed_and_zero_success() {
        let recorder = ThroughputRecorder::new();
        let sample = recorder.record_generation(64, 3, Duration::ZERO, 0, 1);
        assert_eq!(sample.throughput, 0.0);
        assert_eq!(sample.avg_time_per_operation, 0.0);
    }

    #[test]
    fn test_factorization_uses_widest_input() {
        let recorder = ThroughputRecorder::new();
        let numbers = vec![BigUint::from(15u32), BigUint::from(1u64 << 40), BigUint::from(7u32)];
        let sample = recorder.record_factorization(&numbers, Duration::from_millis(500), 3, 2);

        assert_eq!(sample.bits, 41);
        assert_eq!(sample.total_operations, 3);
        assert_eq!(sample.throughput, 6.0);

        let empty = recorder.record_factorization(&[], Duration::from_millis(1), 0, 2);
        assert_eq!(empty.bits, 0);
    }

    #[test]
    fn test_summary_groups_by_kind() {
        let recorder = ThroughputRecorder::new();
        recorder.record_generation(128, 10, Duration::from_secs(1), 10, 2);
        recorder.record_generation(256, 10, Duration::from_secs(2), 10, 2);
        recorder.record_factorization(&[BigUint::from(77u32)], Duration::from_secs(1), 1, 2);

        let summary = recorder.summary();
        assert_eq!(summary.total_batches, 3);
        assert_eq!(summary.prime_generation.batches, 2);
        assert_eq!(summary.prime_generation.avg_throughput, 7.5);
        assert_eq!(summary.prime_generation.max_throughput, 10.0);
        assert_eq!(summary.prime_generation.total_successful, 20);
        assert_eq!(summary.factorization.batches, 1);
        assert_eq!(summary.factorization.total_successful, 1);
    }

    #[test]
    fn test_empty_summary() {
        assert_eq!(ThroughputRecorder::new().summary(), ThroughputSummary::default());
    }
}
