//! Stateful worker node
//!
//! A `WorkerNode` owns its counters and its random source. Nothing outside
//! the node mutates them; the actor in [`super::actor`] is the only caller
//! once a pool is running.

use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use primebench_math::{
    DEFAULT_ROUNDS, Factorization, Factorizer, generate_odd_candidate, is_probably_prime,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::config::{DEFAULT_FACTOR_ITERATION_LIMIT, RunConfig};

/// Worker identifier, unique within a pool
pub type WorkerId = usize;

/// Algorithm settings shared by every node of a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    pub miller_rabin_rounds: u32,
    pub factor_iteration_limit: Option<u64>,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            miller_rabin_rounds: DEFAULT_ROUNDS,
            factor_iteration_limit: Some(DEFAULT_FACTOR_ITERATION_LIMIT),
        }
    }
}

impl From<&RunConfig> for WorkerSettings {
    fn from(config: &RunConfig) -> Self {
        Self {
            miller_rabin_rounds: config.miller_rabin_rounds,
            factor_iteration_limit: config.factor_iteration_limit,
        }
    }
}

/// Mutable node state
#[derive(Debug, Clone)]
struct WorkerState {
    worker_id: WorkerId,
    node_id: String,
    primes_found: u64,
    factorizations_completed: u64,
    total_work_time: Duration,
    start_time: DateTime<Utc>,
}

/// Point-in-time snapshot of a worker's counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerStats {
    pub worker_id: WorkerId,
    pub node_id: String,
    pub primes_found: u64,
    pub factorizations_completed: u64,
    /// Seconds spent inside `find_prime` and `factor`
    pub total_work_time: f64,
    /// Seconds since the node was created
    pub uptime: f64,
    /// `total_work_time / uptime`, zero before any time has passed
    pub efficiency: f64,
    pub start_time: DateTime<Utc>,
}

/// Prime search and factorization unit with cumulative statistics
#[derive(Debug)]
pub struct WorkerNode {
    state: WorkerState,
    settings: WorkerSettings,
    started: Instant,
    rng: StdRng,
}

impl WorkerNode {
    /// Create a node seeded from the thread-local generator
    pub fn new(worker_id: WorkerId, node_id: impl Into<String>, settings: WorkerSettings) -> Self {
        Self::with_rng(
            worker_id,
            node_id,
            settings,
            StdRng::from_rng(&mut rand::rng()),
        )
    }

    /// Create a node with an explicit random source
    pub fn with_rng(
        worker_id: WorkerId,
        node_id: impl Into<String>,
        settings: WorkerSettings,
        rng: StdRng,
    ) -> Self {
        Self {
            state: WorkerState {
                worker_id,
                node_id: node_id.into(),
                primes_found: 0,
                factorizations_completed: 0,
                total_work_time: Duration::ZERO,
                start_time: Utc::now(),
            },
            settings,
            started: Instant::now(),
            rng,
        }
    }

    pub fn worker_id(&self) -> WorkerId {
        self.state.worker_id
    }

    /// Search for a probable prime of exactly `bits` bits.
    ///
    /// Returns `None` once `max_attempts` candidates were rejected.
    pub fn find_prime(&mut self, bits: u64, max_attempts: u32) -> Option<BigUint> {
        let task_start = Instant::now();
        let rounds = self.settings.miller_rabin_rounds;

        let mut found = None;
        for attempt in 0..max_attempts {
            let candidate = generate_odd_candidate(bits, &mut self.rng);
            if is_probably_prime(&candidate, rounds, &mut self.rng) {
                trace!(worker_id = self.state.worker_id, bits, attempt, "prime found");
                found = Some(candidate);
                break;
            }
        }

        if found.is_some() {
            self.state.primes_found += 1;
        } else {
            debug!(
                worker_id = self.state.worker_id,
                bits, max_attempts, "no prime found within attempt budget"
            );
        }
        self.state.total_work_time += task_start.elapsed();
        found
    }

    /// Factor `number` with Pollard's Rho.
    ///
    /// Only complete, non-empty factorizations count as completed.
    pub fn factor(&mut self, number: &BigUint, max_retries: u32) -> Factorization {
        let task_start = Instant::now();
        let mut factorizer = Factorizer::new(max_retries, self.settings.miller_rabin_rounds);
        factorizer.iteration_limit = self.settings.factor_iteration_limit;

        let result = factorizer.factor(number, &mut self.rng);

        if result.is_complete() && !result.factors.is_empty() {
            self.state.factorizations_completed += 1;
        } else if !result.is_complete() {
            debug!(
                worker_id = self.state.worker_id,
                number = %number,
                "factorization inconclusive"
            );
        }
        self.state.total_work_time += task_start.elapsed();
        result
    }

    /// Snapshot the counters
    pub fn stats(&self) -> WorkerStats {
        let uptime = self.started.elapsed().as_secs_f64();
        let total_work_time = self.state.total_work_time.as_secs_f64();
        WorkerStats {
            worker_id: self.state.worker_id,
            node_id: self.state.node_id.clone(),
            primes_found: self.state.primes_found,
            factorizations_completed: self.state.factorizations_completed,
            total_work_time,
            uptime,
            efficiency: if uptime > 0.0 {
                total_work_time / uptime
            } else {
                0.0
            },
            start_time: self.state.start_time,
        }
    }
}
