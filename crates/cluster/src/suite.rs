//! End-to-end test run
//!
//! Drives generation batches, optional validation, the configured
//! factorization list and the products of generated primes, then merges
//! everything into a [`RunReport`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use primebench_math::{
    DeterministicCheck, Factorization, PrimalityCheck, ValidationReport, decimal, validate_primes,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::Result;
use crate::config::RunConfig;
use crate::distributor::{FactorizationBatch, GenerationBatch, WorkDistributor};
use crate::monitor::ResourceMonitor;
use crate::stats::{ClusterReport, StatsAggregator};
use crate::throughput::ThroughputRecorder;
use crate::worker::{WorkerHandle, WorkerId};

/// What was asked for and found in one generation batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub bits: u64,
    pub requested: usize,
    pub found: usize,
    pub not_found: usize,
    pub failed: usize,
    /// Seconds
    pub elapsed: f64,
    #[serde(with = "decimal::vec")]
    pub primes: Vec<BigUint>,
    pub validation: Option<ValidationReport>,
}

impl GenerationRecord {
    fn from_batch(batch: GenerationBatch, validation: Option<ValidationReport>) -> Self {
        Self {
            bits: batch.bits,
            requested: batch.requested,
            found: batch.succeeded(),
            not_found: batch.not_found,
            failed: batch.failures.len(),
            elapsed: batch.elapsed.as_secs_f64(),
            primes: batch.primes,
            validation,
        }
    }
}

/// Where a factorized number came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorizationSource {
    /// Listed in the configuration
    Configured,
    /// Product of two consecutive generated primes
    PrimeProduct,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorizationRecord {
    pub source: FactorizationSource,
    #[serde(with = "decimal")]
    pub number: BigUint,
    pub worker_id: WorkerId,
    pub factorization: Option<Factorization>,
    pub error: Option<String>,
}

impl FactorizationRecord {
    fn from_batch(source: FactorizationSource, batch: FactorizationBatch) -> Vec<Self> {
        batch
            .outcomes
            .into_iter()
            .map(|outcome| {
                let (factorization, error) = match outcome.result {
                    Ok(factorization) => (Some(factorization), None),
                    Err(e) => (None, Some(e.to_string())),
                };
                Self {
                    source,
                    number: outcome.number,
                    worker_id: outcome.worker_id,
                    factorization,
                    error,
                }
            })
            .collect()
    }
}

/// Everything one run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub config: RunConfig,
    pub generation: Vec<GenerationRecord>,
    pub factorization: Vec<FactorizationRecord>,
    pub cluster: ClusterReport,
}

impl RunReport {
    pub fn validations(&self) -> impl Iterator<Item = &ValidationReport> {
        self.generation.iter().filter_map(|g| g.validation.as_ref())
    }
}

/// Products `p0*p1, p2*p3, ...` of consecutive primes, at most `limit` of them
pub fn consecutive_products(primes: &[BigUint], limit: usize) -> Vec<BigUint> {
    primes
        .chunks_exact(2)
        .take(limit)
        .map(|pair| &pair[0] * &pair[1])
        .collect()
}

/// Runs a complete benchmark over a worker pool
pub struct ClusterSuite {
    config: RunConfig,
    distributor: WorkDistributor,
    recorder: ThroughputRecorder,
    check: Arc<dyn PrimalityCheck>,
}

impl ClusterSuite {
    pub fn new(config: RunConfig, workers: &[WorkerHandle]) -> Self {
        let distributor =
            WorkDistributor::new(workers, config.max_attempts, config.factor_max_retries);
        Self {
            config,
            distributor,
            recorder: ThroughputRecorder::new(),
            check: Arc::new(DeterministicCheck),
        }
    }

    /// Replace the primality check used for validation
    pub fn with_check(mut self, check: impl PrimalityCheck + 'static) -> Self {
        self.check = Arc::new(check);
        self
    }

    pub fn recorder(&self) -> &ThroughputRecorder {
        &self.recorder
    }

    /// One generation batch, validated when enabled
    pub async fn generate(&self, bits: u64, count: usize) -> Result<GenerationRecord> {
        let batch = self.distributor.distribute_generation(bits, count).await?;

        let sample = self.recorder.record_generation(
            bits,
            count,
            batch.elapsed,
            batch.succeeded(),
            self.distributor.pool_size(),
        );
        info!(
            "Generated {}/{} primes of {} bits: {:.2} primes/s, {:.4}s per prime",
            sample.successful_operations,
            sample.total_operations,
            bits,
            sample.throughput,
            sample.avg_time_per_operation
        );

        let validation = if self.config.validate_enabled && !batch.primes.is_empty() {
            let primes = batch.primes.clone();
            let check = Arc::clone(&self.check);
            let report =
                tokio::task::spawn_blocking(move || validate_primes(&primes, check.as_ref()))
                    .await?;
            Some(report)
        } else {
            None
        };

        Ok(GenerationRecord::from_batch(batch, validation))
    }

    /// One factorization batch
    pub async fn factorize(
        &self,
        numbers: &[BigUint],
        source: FactorizationSource,
    ) -> Result<Vec<FactorizationRecord>> {
        let batch = self.distributor.distribute_factorization(numbers).await?;

        let sample = self.recorder.record_factorization(
            numbers,
            batch.elapsed,
            batch.completed(),
            self.distributor.pool_size(),
        );
        info!(
            "Factorized {}/{} numbers of up to {} bits: {:.2} numbers/s, {:.4}s per number",
            sample.successful_operations,
            sample.total_operations,
            sample.bits,
            sample.throughput,
            sample.avg_time_per_operation
        );

        Ok(FactorizationRecord::from_batch(source, batch))
    }

    /// Run every configured batch and build the report
    pub async fn run(&self, monitor: &ResourceMonitor) -> Result<RunReport> {
        let started_at = Utc::now();
        info!(
            workers = self.distributor.pool_size(),
            batches = self.config.generate_list.len(),
            factorize = self.config.factorize_list.len(),
            products = self.config.product_factorizations,
            validate = self.config.validate_enabled,
            "Starting cluster test"
        );

        let mut generation = Vec::with_capacity(self.config.generate_list.len());
        for (i, &(bits, count)) in self.config.generate_list.iter().enumerate() {
            info!("Generation task {}: {} primes of {} bits", i + 1, count, bits);
            generation.push(self.generate(bits, count).await?);
        }

        let mut factorization = Vec::new();
        for (i, number) in self.config.factorize_list.iter().enumerate() {
            info!("Factorization task {}: {}", i + 1, number);
            factorization.extend(
                self.factorize(std::slice::from_ref(number), FactorizationSource::Configured)
                    .await?,
            );
        }

        if self.config.product_factorizations > 0 {
            let primes: Vec<BigUint> = generation
                .iter()
                .flat_map(|g| g.primes.iter().cloned())
                .collect();
            let products = consecutive_products(&primes, self.config.product_factorizations);

            if products.len() < self.config.product_factorizations {
                warn!(
                    requested = self.config.product_factorizations,
                    available = products.len(),
                    "Not enough generated primes for every product factorization"
                );
            }
            if !products.is_empty() {
                info!("Factorizing {} prime products", products.len());
                factorization.extend(
                    self.factorize(&products, FactorizationSource::PrimeProduct)
                        .await?,
                );
            }
        }

        let worker_stats = self.distributor.gather_stats().await;
        let cluster = StatsAggregator::aggregate(
            self.config.workers,
            worker_stats,
            self.recorder.summary(),
            monitor.summary(),
        );

        info!("Cluster test finished");
        cluster.log_summary();

        Ok(RunReport {
            started_at,
            finished_at: Utc::now(),
            config: self.config.clone(),
            generation,
            factorization,
            cluster,
        })
    }
}
