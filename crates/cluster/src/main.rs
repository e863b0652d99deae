//! primebench entry point
//!
//! Runs one benchmark on the local machine and writes a JSON report.

use primebench_cluster::{
    ClusterError, ClusterSuite, ResourceMonitor, Result, RunConfig, SysinfoSource, WorkerPool,
    WorkerSettings,
};
use sysinfo::System;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    let config = RunConfig::from_env()?;

    // Initialize logging; RUST_LOG wins over the configured level
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting primebench...");
    let config = load_config(config)?;

    let node_id = System::host_name().unwrap_or_else(|| Uuid::new_v4().to_string());
    info!(
        "Configuration loaded: node={}, workers={}, rounds={}",
        node_id, config.workers, config.miller_rabin_rounds
    );

    let pool = WorkerPool::spawn(config.workers, &node_id, WorkerSettings::from(&config))?;

    let monitor = ResourceMonitor::from_config(node_id.as_str(), &config);
    if monitor.is_enabled() {
        monitor.start(SysinfoSource::new()?)?;
    }

    let suite = ClusterSuite::new(config.clone(), pool.handles());
    let outcome = tokio::select! {
        result = suite.run(&monitor) => result,
        _ = tokio::signal::ctrl_c() => Err(ClusterError::Interrupted),
    };

    if let Err(e) = monitor.stop().await {
        warn!("Failed to stop resource monitor: {}", e);
    }

    let report = match outcome {
        Ok(report) => report,
        Err(ClusterError::Interrupted) => {
            // Worker threads are abandoned with whatever they still have queued
            warn!("Interrupted, abandoning in-flight tasks");
            return Err(ClusterError::Interrupted);
        }
        Err(e) => {
            error!("Cluster test failed: {}", e);
            return Err(e);
        }
    };

    drop(suite);
    tokio::task::spawn_blocking(move || pool.shutdown()).await?;

    let path = report.save(&config.report_dir)?;
    info!("primebench finished, report written to {}", path.display());
    Ok(())
}

fn load_config(config: RunConfig) -> Result<RunConfig> {
    match config.validate() {
        Ok(()) => Ok(config),
        Err(e) => {
            error!("Invalid configuration: {}", e);
            Err(e.into())
        }
    }
}
