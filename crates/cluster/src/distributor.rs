//! Scatter-gather over a worker pool
//!
//! Generation batches are split evenly across workers and gathered in
//! completion order. Factorization batches are dealt round-robin and
//! gathered in submission order so outcome `i` always belongs to input `i`.

use std::time::{Duration, Instant};

use futures::StreamExt;
use futures::future::join_all;
use futures::stream::FuturesUnordered;
use num_bigint::BigUint;
use primebench_math::Factorization;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::worker::{WorkerError, WorkerHandle, WorkerId, WorkerStats};

/// Distribution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DistributionError {
    #[error("Worker pool is empty")]
    EmptyPool,
}

/// A task that never produced a result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    /// Position of the task within its batch
    pub index: usize,
    pub worker_id: WorkerId,
    pub error: WorkerError,
}

/// Gathered result of one generation batch
#[derive(Debug, Clone)]
pub struct GenerationBatch {
    pub bits: u64,
    pub requested: usize,
    /// Tasks handed to each worker, indexed by pool position
    pub assignments: Vec<usize>,
    /// Primes in completion order
    pub primes: Vec<BigUint>,
    /// Tasks that ran out of attempts
    pub not_found: usize,
    pub failures: Vec<TaskFailure>,
    pub elapsed: Duration,
}

impl GenerationBatch {
    pub fn succeeded(&self) -> usize {
        self.primes.len()
    }
}

/// One factorization task and what came back for it
#[derive(Debug, Clone)]
pub struct FactorizationOutcome {
    pub number: BigUint,
    pub worker_id: WorkerId,
    pub result: Result<Factorization, WorkerError>,
}

/// Gathered result of one factorization batch, in input order
#[derive(Debug, Clone)]
pub struct FactorizationBatch {
    pub outcomes: Vec<FactorizationOutcome>,
    pub elapsed: Duration,
}

impl FactorizationBatch {
    /// Outcomes with a complete, non-empty factor list
    pub fn completed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| {
                o.result
                    .as_ref()
                    .is_ok_and(|f| f.is_complete() && !f.factors.is_empty())
            })
            .count()
    }

    pub fn failures(&self) -> Vec<TaskFailure> {
        self.outcomes
            .iter()
            .enumerate()
            .filter_map(|(index, o)| {
                o.result.as_ref().err().map(|error| TaskFailure {
                    index,
                    worker_id: o.worker_id,
                    error: error.clone(),
                })
            })
            .collect()
    }
}

/// Number of tasks each of `pool_size` workers receives for `count` tasks.
///
/// The first `count % pool_size` workers take one extra task.
pub fn partition(count: usize, pool_size: usize) -> Vec<usize> {
    if pool_size == 0 {
        return Vec::new();
    }
    let base = count / pool_size;
    let extra = count % pool_size;
    (0..pool_size)
        .map(|i| base + usize::from(i < extra))
        .collect()
}

/// Fans batches out over a fixed set of worker handles
#[derive(Debug, Clone)]
pub struct WorkDistributor {
    workers: Vec<WorkerHandle>,
    max_attempts: u32,
    max_retries: u32,
}

impl WorkDistributor {
    pub fn new(workers: &[WorkerHandle], max_attempts: u32, max_retries: u32) -> Self {
        Self {
            workers: workers.to_vec(),
            max_attempts,
            max_retries,
        }
    }

    pub fn pool_size(&self) -> usize {
        self.workers.len()
    }

    /// Find `count` primes of `bits` bits across the pool
    pub async fn distribute_generation(
        &self,
        bits: u64,
        count: usize,
    ) -> Result<GenerationBatch, DistributionError> {
        if self.workers.is_empty() {
            return Err(DistributionError::EmptyPool);
        }

        let start = Instant::now();
        let assignments = partition(count, self.workers.len());
        debug!(bits, count, ?assignments, "distributing prime generation");

        let mut failures = Vec::new();
        let mut in_flight = FuturesUnordered::new();
        let mut index = 0;

        for (worker, &tasks) in self.workers.iter().zip(&assignments) {
            for _ in 0..tasks {
                match worker.submit_find_prime(bits, self.max_attempts) {
                    Ok(pending) => in_flight.push(async move {
                        let worker_id = pending.worker_id();
                        (index, worker_id, pending.wait().await)
                    }),
                    Err(error) => failures.push(TaskFailure {
                        index,
                        worker_id: worker.worker_id(),
                        error,
                    }),
                }
                index += 1;
            }
        }

        let mut primes = Vec::with_capacity(count);
        let mut not_found = 0;

        while let Some((index, worker_id, result)) = in_flight.next().await {
            match result {
                Ok(Some(prime)) => primes.push(prime),
                Ok(None) => not_found += 1,
                Err(error) => failures.push(TaskFailure {
                    index,
                    worker_id,
                    error,
                }),
            }
        }

        for failure in &failures {
            warn!(
                index = failure.index,
                worker_id = failure.worker_id,
                error = %failure.error,
                "generation task failed"
            );
        }

        let batch = GenerationBatch {
            bits,
            requested: count,
            assignments,
            primes,
            not_found,
            failures,
            elapsed: start.elapsed(),
        };

        info!(
            bits,
            requested = count,
            found = batch.succeeded(),
            not_found = batch.not_found,
            failed = batch.failures.len(),
            elapsed_ms = batch.elapsed.as_millis() as u64,
            "generation batch finished"
        );
        Ok(batch)
    }

    /// Factor every number, dealing them round-robin over the pool
    pub async fn distribute_factorization(
        &self,
        numbers: &[BigUint],
    ) -> Result<FactorizationBatch, DistributionError> {
        if self.workers.is_empty() {
            return Err(DistributionError::EmptyPool);
        }

        let start = Instant::now();
        let len = self.workers.len();

        let tasks = numbers.iter().enumerate().map(|(i, number)| {
            let worker = &self.workers[i % len];
            let submitted = worker.submit_factor(number.clone(), self.max_retries);
            let worker_id = worker.worker_id();
            async move {
                let result = match submitted {
                    Ok(pending) => pending.wait().await,
                    Err(error) => Err(error),
                };
                FactorizationOutcome {
                    number: number.clone(),
                    worker_id,
                    result,
                }
            }
        });

        // Submission happens while building the futures, before any await
        let tasks: Vec<_> = tasks.collect();
        let outcomes = join_all(tasks).await;

        let batch = FactorizationBatch {
            outcomes,
            elapsed: start.elapsed(),
        };

        for failure in batch.failures() {
            warn!(
                index = failure.index,
                worker_id = failure.worker_id,
                error = %failure.error,
                "factorization task failed"
            );
        }

        info!(
            numbers = numbers.len(),
            completed = batch.completed(),
            elapsed_ms = batch.elapsed.as_millis() as u64,
            "factorization batch finished"
        );
        Ok(batch)
    }

    /// Snapshot every reachable worker
    pub async fn gather_stats(&self) -> Vec<WorkerStats> {
        let replies = join_all(self.workers.iter().map(|w| w.stats())).await;

        replies
            .into_iter()
            .filter_map(|reply| match reply {
                Ok(stats) => Some(stats),
                Err(e) => {
                    warn!(error = %e, "skipping worker stats");
                    None
                }
            })
            .collect()
    }
}
