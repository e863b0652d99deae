//! Resource readings
//!
//! This module reads CPU, memory, network and disk counters using the sysinfo crate.

use serde::{Deserialize, Serialize};
use sysinfo::{MemoryRefreshKind, Networks, Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::debug;

use super::MonitorError;

/// Cumulative network counters summed over all interfaces
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkCounters {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub packets_sent: u64,
    pub packets_received: u64,
}

/// Cumulative disk counters of this process
///
/// Bytes only, and only for the benchmark process itself: sysinfo 0.33
/// exposes per-process read/write totals but no machine-wide disk I/O or
/// operation counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskCounters {
    pub read_bytes: u64,
    pub written_bytes: u64,
}

/// One raw reading, before it is stamped with time and node
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceReading {
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub network: NetworkCounters,
    pub disk: DiskCounters,
}

/// Something that can produce resource readings on demand
pub trait MetricsSource: Send + 'static {
    fn collect(&mut self) -> Result<ResourceReading, MonitorError>;
}

/// Reads the local machine through sysinfo
pub struct SysinfoSource {
    system: System,
    networks: Networks,
    pid: Pid,
}

impl SysinfoSource {
    /// Create a source for the current process
    pub fn new() -> Result<Self, MonitorError> {
        let pid = sysinfo::get_current_pid().map_err(|e| MonitorError::Collect(e.to_string()))?;

        let mut system = System::new();
        // CPU usage is a delta, so prime it with one refresh
        system.refresh_cpu_usage();
        system.refresh_memory_specifics(MemoryRefreshKind::nothing().with_ram());

        Ok(Self {
            system,
            networks: Networks::new_with_refreshed_list(),
            pid,
        })
    }

    fn disk_counters(&mut self) -> Result<DiskCounters, MonitorError> {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::nothing().with_disk_usage(),
        );

        let process = self
            .system
            .process(self.pid)
            .ok_or_else(|| MonitorError::Collect(format!("Process {} not found", self.pid)))?;

        let usage = process.disk_usage();
        Ok(DiskCounters {
            read_bytes: usage.total_read_bytes,
            written_bytes: usage.total_written_bytes,
        })
    }

    fn network_counters(&mut self) -> NetworkCounters {
        self.networks.refresh(true);

        self.networks
            .list()
            .values()
            .fold(NetworkCounters::default(), |acc, data| NetworkCounters {
                bytes_sent: acc.bytes_sent + data.total_transmitted(),
                bytes_received: acc.bytes_received + data.total_received(),
                packets_sent: acc.packets_sent + data.total_packets_transmitted(),
                packets_received: acc.packets_received + data.total_packets_received(),
            })
    }
}

impl MetricsSource for SysinfoSource {
    fn collect(&mut self) -> Result<ResourceReading, MonitorError> {
        self.system.refresh_cpu_usage();
        let cpu_percent = self.system.global_cpu_usage();

        self.system
            .refresh_memory_specifics(MemoryRefreshKind::nothing().with_ram());
        let total_memory = self.system.total_memory();
        let memory_percent = if total_memory > 0 {
            (self.system.used_memory() as f64 / total_memory as f64 * 100.0) as f32
        } else {
            0.0
        };

        let network = self.network_counters();
        let disk = self.disk_counters()?;

        debug!(
            "Resource reading: CPU {:.1}%, MEM {:.1}%, NET tx {} rx {} bytes",
            cpu_percent, memory_percent, network.bytes_sent, network.bytes_received
        );

        Ok(ResourceReading {
            cpu_percent,
            memory_percent,
            network,
            disk,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sysinfo_source_reads_percentages() {
        let mut source = SysinfoSource::new().unwrap();
        let reading = source.collect().unwrap();

        assert!(reading.cpu_percent >= 0.0);
        assert!(reading.memory_percent >= 0.0);
        assert!(reading.memory_percent <= 100.0);
    }

    #[test]
    fn test_counters_are_cumulative() {
        let mut source = SysinfoSource::new().unwrap();
        let first = source.collect().unwrap();
        let second = source.collect().unwrap();

        assert!(second.network.bytes_sent >= first.network.bytes_sent);
        assert!(second.disk.read_bytes >= first.disk.read_bytes);
    }
}
