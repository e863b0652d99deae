//! Run configuration
//!
//! Defaults are overlaid by an optional JSON file (`PRIMEBENCH_CONFIG_FILE`)
//! and then by individual `PRIMEBENCH_*` environment variables.

use num_bigint::BigUint;
use primebench_math::decimal;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    Missing(String),

    #[error("Invalid configuration value: {0}")]
    Invalid(String),

    #[error("Failed to read configuration file {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Rho steps per attempt before a factorization attempt gives up
pub const DEFAULT_FACTOR_ITERATION_LIMIT: u64 = 1_000_000;

/// One prime generation batch: bit length and number of primes.
pub type GenerateTask = (u64, usize);

/// Test run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Worker pool size
    pub workers: usize,

    /// Generation batches as `[bits, count]` pairs
    pub generate_list: Vec<GenerateTask>,

    /// Numbers factored one batch each
    #[serde(with = "decimal::vec")]
    pub factorize_list: Vec<BigUint>,

    /// Products of consecutive generated primes to factor afterwards
    #[serde(alias = "num_of_factorize")]
    pub product_factorizations: usize,

    /// Cross-check generated primes with the deterministic validator
    #[serde(alias = "validate_enable")]
    pub validate_enabled: bool,

    /// Algorithm settings
    pub miller_rabin_rounds: u32,
    pub max_attempts: u32,
    pub factor_max_retries: u32,
    /// `None` lets each Rho attempt run until it finds a divisor
    pub factor_iteration_limit: Option<u64>,

    /// Monitoring settings
    pub monitor_enabled: bool,
    pub monitor_interval_ms: u64,

    /// Output settings
    pub report_dir: PathBuf,
    pub log_level: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            generate_list: vec![(512, 50), (1024, 20)],
            factorize_list: Vec::new(),
            product_factorizations: 0,
            validate_enabled: true,
            miller_rabin_rounds: 5,
            max_attempts: 1000,
            factor_max_retries: 10,
            factor_iteration_limit: Some(DEFAULT_FACTOR_ITERATION_LIMIT),
            monitor_enabled: true,
            monitor_interval_ms: 1000,
            report_dir: PathBuf::from("."),
            log_level: "info".to_string(),
        }
    }
}

impl RunConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup("PRIMEBENCH_CONFIG_FILE") {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        if let Some(workers) = lookup("PRIMEBENCH_WORKERS") {
            config.workers = parse_var("PRIMEBENCH_WORKERS", &workers)?;
        }

        if let Some(rounds) = lookup("PRIMEBENCH_MILLER_RABIN_ROUNDS") {
            config.miller_rabin_rounds = parse_var("PRIMEBENCH_MILLER_RABIN_ROUNDS", &rounds)?;
        }

        if let Some(attempts) = lookup("PRIMEBENCH_MAX_ATTEMPTS") {
            config.max_attempts = parse_var("PRIMEBENCH_MAX_ATTEMPTS", &attempts)?;
        }

        if let Some(retries) = lookup("PRIMEBENCH_FACTOR_MAX_RETRIES") {
            config.factor_max_retries = parse_var("PRIMEBENCH_FACTOR_MAX_RETRIES", &retries)?;
        }

        // 0 removes the limit
        if let Some(limit) = lookup("PRIMEBENCH_FACTOR_ITERATION_LIMIT") {
            let limit: u64 = parse_var("PRIMEBENCH_FACTOR_ITERATION_LIMIT", &limit)?;
            config.factor_iteration_limit = (limit > 0).then_some(limit);
        }

        if let Some(validate) = lookup("PRIMEBENCH_VALIDATE") {
            config.validate_enabled = validate.to_lowercase() == "true";
        }

        if let Some(monitor) = lookup("PRIMEBENCH_MONITOR_ENABLED") {
            config.monitor_enabled = monitor.to_lowercase() == "true";
        }

        if let Some(interval) = lookup("PRIMEBENCH_MONITOR_INTERVAL_MS") {
            config.monitor_interval_ms = parse_var("PRIMEBENCH_MONITOR_INTERVAL_MS", &interval)?;
        }

        if let Some(dir) = lookup("PRIMEBENCH_REPORT_DIR") {
            config.report_dir = PathBuf::from(dir);
        }

        if let Some(level) = lookup("PRIMEBENCH_LOG_LEVEL") {
            config.log_level = level;
        }

        Ok(config)
    }

    /// Load a JSON file; missing fields keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::File {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".to_string()));
        }

        if self.miller_rabin_rounds == 0 {
            return Err(ConfigError::Invalid(
                "miller_rabin_rounds must be at least 1".to_string(),
            ));
        }

        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        if let Some((bits, _)) = self.generate_list.iter().find(|(bits, _)| *bits < 2) {
            return Err(ConfigError::Invalid(format!(
                "generate_list entry with {bits} bits, need at least 2"
            )));
        }

        if self.monitor_enabled && self.monitor_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "monitor_interval_ms cannot be 0".to_string(),
            ));
        }

        if self.log_level.trim().is_empty() {
            return Err(ConfigError::Missing("log_level".to_string()));
        }

        Ok(())
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(key.to_string()))
}
