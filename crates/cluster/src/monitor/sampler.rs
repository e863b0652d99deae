//! Periodic sampling with an explicit start/stop lifecycle

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use super::MonitorError;
use super::resources::{DiskCounters, MetricsSource, NetworkCounters};
use crate::config::RunConfig;

/// A reading stamped with time and node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    pub timestamp: DateTime<Utc>,
    pub node_id: String,
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub network: NetworkCounters,
    pub disk: DiskCounters,
}

/// Aggregate view of a sample history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSummary {
    pub sample_count: usize,
    /// Seconds between the first and the last sample
    pub duration: f64,
    pub avg_cpu_percent: f32,
    pub max_cpu_percent: f32,
    pub avg_memory_percent: f32,
    pub max_memory_percent: f32,
}

/// Summarize a history, `None` when it is empty
pub fn summarize(samples: &[ResourceSample]) -> Option<ResourceSummary> {
    let first = samples.first()?;
    let last = samples.last()?;
    let count = samples.len() as f32;

    let duration = (last.timestamp - first.timestamp)
        .to_std()
        .unwrap_or(Duration::ZERO)
        .as_secs_f64();

    Some(ResourceSummary {
        sample_count: samples.len(),
        duration,
        avg_cpu_percent: samples.iter().map(|s| s.cpu_percent).sum::<f32>() / count,
        max_cpu_percent: samples.iter().map(|s| s.cpu_percent).fold(0.0, f32::max),
        avg_memory_percent: samples.iter().map(|s| s.memory_percent).sum::<f32>() / count,
        max_memory_percent: samples.iter().map(|s| s.memory_percent).fold(0.0, f32::max),
    })
}

/// Background resource sampler
pub struct ResourceMonitor {
    node_id: String,
    interval: Duration,
    enabled: bool,
    history: Arc<RwLock<Vec<ResourceSample>>>,
    shutdown_tx: broadcast::Sender<()>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ResourceMonitor {
    /// Create a monitor sampling every `interval`
    pub fn new(node_id: impl Into<String>, interval: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            node_id: node_id.into(),
            interval,
            enabled: true,
            history: Arc::new(RwLock::new(Vec::new())),
            shutdown_tx,
            task: Mutex::new(None),
        }
    }

    /// Create a monitor following the run configuration
    pub fn from_config(node_id: impl Into<String>, config: &RunConfig) -> Self {
        let mut monitor = Self::new(node_id, config.monitor_interval());
        monitor.enabled = config.monitor_enabled;
        monitor
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().is_some()
    }

    /// Start sampling `source` in a background task.
    ///
    /// Does nothing when monitoring is disabled.
    pub fn start<S: MetricsSource>(&self, mut source: S) -> Result<(), MonitorError> {
        if !self.enabled {
            debug!("Resource monitoring disabled");
            return Ok(());
        }

        let mut task = self.task.lock();
        if task.is_some() {
            return Err(MonitorError::AlreadyRunning);
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| MonitorError::NoRuntime)?;

        let node_id = self.node_id.clone();
        let history = Arc::clone(&self.history);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        *task = Some(runtime.spawn(async move {
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match source.collect() {
                            Ok(reading) => history.write().push(ResourceSample {
                                timestamp: Utc::now(),
                                node_id: node_id.clone(),
                                cpu_percent: reading.cpu_percent,
                                memory_percent: reading.memory_percent,
                                network: reading.network,
                                disk: reading.disk,
                            }),
                            Err(e) => warn!("Skipping resource sample: {}", e),
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        }));

        info!(interval_ms = self.interval.as_millis() as u64, "Resource monitor started");
        Ok(())
    }

    /// Stop the background task and wait for it to finish
    pub async fn stop(&self) -> Result<(), MonitorError> {
        let task = self.task.lock().take();
        let Some(task) = task else {
            return Ok(());
        };

        let _ = self.shutdown_tx.send(());
        task.await.map_err(|e| MonitorError::Join(e.to_string()))?;

        info!(samples = self.history.read().len(), "Resource monitor stopped");
        Ok(())
    }

    /// Copy of every sample collected so far
    pub fn samples(&self) -> Vec<ResourceSample> {
        self.history.read().clone()
    }

    pub fn summary(&self) -> Option<ResourceSummary> {
        summarize(&self.history.read())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::ResourceReading;
    use chrono::TimeDelta;
    use pretty_assertions::assert_eq;

    /// Fails every other tick
    struct FlakySource {
        ticks: u32,
    }

    impl MetricsSource for FlakySource {
        fn collect(&mut self) -> Result<ResourceReading, MonitorError> {
            self.ticks += 1;
            if self.ticks % 2 == 0 {
                return Err(MonitorError::Collect("sensor unavailable".to_string()));
            }
            Ok(ResourceReading {
                cpu_percent: self.ticks as f32,
                memory_percent: 50.0,
                ..Default::default()
            })
        }
    }

    fn sample(offset_ms: i64, cpu: f32, memory: f32) -> ResourceSample {
        let base = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap_or_default();
        ResourceSample {
            timestamp: base + TimeDelta::milliseconds(offset_ms),
            node_id: "node".to_string(),
            cpu_percent: cpu,
            memory_percent: memory,
            network: NetworkCounters::default(),
            disk: DiskCounters::default(),
        }
    }

    #[test]
    fn test_summarize_empty() {
        assert_eq!(summarize(&[]), None);
    }

    #[test]
    fn test_summarize_history() {
        let samples = vec![sample(0, 10.0, 40.0), sample(500, 30.0, 60.0), sample(2000, 20.0, 50.0)];
        let summary = summarize(&samples).unwrap();

        assert_eq!(summary.sample_count, 3);
        assert_eq!(summary.duration, 2.0);
        assert_eq!(summary.avg_cpu_percent, 20.0);
        assert_eq!(summary.max_cpu_percent, 30.0);
        assert_eq!(summary.avg_memory_percent, 50.0);
        assert_eq!(summary.max_memory_percent, 60.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_ticks_are_skipped() {
        let monitor = ResourceMonitor::new("node", Duration::from_millis(100));
        monitor.start(FlakySource { ticks: 0 }).unwrap();
        assert!(monitor.is_running());

        tokio::time::sleep(Duration::from_millis(950)).await;
        monitor.stop().await.unwrap();
        assert!(!monitor.is_running());

        let samples = monitor.samples();
        assert!(!samples.is_empty());
        // Only odd ticks produce a sample
        assert!(samples.iter().all(|s| s.cpu_percent as u32 % 2 == 1));
        assert_eq!(monitor.summary().unwrap().sample_count, samples.len());
    }

    #[tokio::test]
    async fn test_double_start_rejected() {
        let monitor = ResourceMonitor::new("node", Duration::from_millis(50));
        monitor.start(FlakySource { ticks: 0 }).unwrap();
        assert_eq!(
            monitor.start(FlakySource { ticks: 0 }),
            Err(MonitorError::AlreadyRunning)
        );
        monitor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_disabled_monitor_is_a_no_op() {
        let config = RunConfig {
            monitor_enabled: false,
            ..RunConfig::default()
        };
        let monitor = ResourceMonitor::from_config("node", &config);
        monitor.start(FlakySource { ticks: 0 }).unwrap();

        assert!(!monitor.is_running());
        monitor.stop().await.unwrap();
        assert_eq!(monitor.summary(), None);
    }

    #[test]
    fn test_start_outside_runtime() {
        let monitor = ResourceMonitor::new("node", Duration::from_millis(50));
        assert_eq!(
            monitor.start(FlakySource { ticks: 0 }),
            Err(MonitorError::NoRuntime)
        );
    }
}
