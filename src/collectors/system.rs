//! # System Metrics Collector
//!
//! Point-in-time snapshots of the host: CPU cores and load, memory, root
//! filesystem usage and the collector process's own runtime counters.
//!
//! Memory is read from the OS first. When the OS reports a total of zero
//! (restricted containers, unsupported platforms) the process figures are
//! used instead and `ram_source` says so.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use sysinfo::{Disks, Pid, System};
use tracing::{debug, warn};

/// Which memory figures a snapshot carries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RamSource {
    #[default]
    System,
    Process,
}

impl RamSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RamSource::System => "system",
            RamSource::Process => "process",
        }
    }
}

/// A snapshot of host and process resource usage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemMetrics {
    pub cpu_cores: usize,
    /// Live async tasks per core.
    pub cpu_load: f64,
    pub ram_total: u64,
    pub ram_used: u64,
    pub ram_free: u64,
    pub ram_source: RamSource,
    pub disk_total: u64,
    pub disk_used: u64,
    pub disk_free: u64,
    pub tasks: usize,
    pub process_resident_bytes: u64,
    pub process_virtual_bytes: u64,
    pub process_run_time_secs: u64,
    pub timestamp: DateTime<Utc>,
}

/// One named sample derived from a `SystemMetrics` snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemMetric {
    pub name: String,
    pub value: f64,
    pub labels: BTreeMap<String, String>,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryReading {
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcessReading {
    pub resident: u64,
    pub virtual_bytes: u64,
    pub run_time_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiskReading {
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

/// Picks the OS memory reading, or the process reading when the OS reports
/// no memory at all.
pub fn resolve_memory(os: MemoryReading, process: ProcessReading) -> (MemoryReading, RamSource) {
    if os.total > 0 {
        return (os, RamSource::System);
    }
    let reading = MemoryReading {
        total: process.virtual_bytes,
        used: process.resident,
        free: process.virtual_bytes.saturating_sub(process.resident),
    };
    (reading, RamSource::Process)
}

/// Live task count of the current tokio runtime, zero outside one.
fn live_tasks() -> usize {
    tokio::runtime::Handle::try_current()
        .map(|handle| handle.metrics().num_alive_tasks())
        .unwrap_or(0)
}

/// A collector for host and process metrics.
pub struct SystemCollector {
    system: System,
    pid: Option<Pid>,
}

impl Default for SystemCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemCollector {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                warn!("Failed to get current PID: {}", e);
                None
            }
        };
        Self {
            system: System::new(),
            pid,
        }
    }

    /// Takes a fresh snapshot.
    pub fn collect(&mut self) -> SystemMetrics {
        let cpu_cores = num_cpus::get().max(1);
        let tasks = live_tasks();

        self.system.refresh_memory();
        let os = MemoryReading {
            total: self.system.total_memory(),
            used: self.system.used_memory(),
            free: self.system.available_memory(),
        };

        let process = self.process_reading();
        let (memory, ram_source) = resolve_memory(os, process);
        if ram_source == RamSource::Process {
            warn!("OS memory statistics unavailable, reporting process memory instead");
        }

        let disk = root_disk_usage().unwrap_or_else(|| {
            warn!("Root filesystem not found in disk listing, disk usage left at zero");
            DiskReading::default()
        });

        let metrics = SystemMetrics {
            cpu_cores,
            cpu_load: tasks as f64 / cpu_cores as f64,
            ram_total: memory.total,
            ram_used: memory.used,
            ram_free: memory.free,
            ram_source,
            disk_total: disk.total,
            disk_used: disk.used,
            disk_free: disk.free,
            tasks,
            process_resident_bytes: process.resident,
            process_virtual_bytes: process.virtual_bytes,
            process_run_time_secs: process.run_time_secs,
            timestamp: Utc::now(),
        };
        debug!(?metrics, "System metrics collected");
        metrics
    }

    fn process_reading(&mut self) -> ProcessReading {
        let Some(pid) = self.pid else {
            return ProcessReading::default();
        };
        if !self.system.refresh_process(pid) {
            warn!("Process {} not found while reading runtime counters", pid);
            return ProcessReading::default();
        }
        self.system
            .process(pid)
            .map(|process| ProcessReading {
                resident: process.memory(),
                virtual_bytes: process.virtual_memory(),
                run_time_secs: process.run_time(),
            })
            .unwrap_or_default()
    }
}

fn root_disk_usage() -> Option<DiskReading> {
    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .find(|disk| disk.mount_point() == Path::new("/"))
        .map(|disk| {
            let total = disk.total_space();
            let free = disk.available_space();
            DiskReading {
                total,
                used: total.saturating_sub(free),
                free,
            }
        })
}

impl SystemMetrics {
    /// Splits the snapshot into named samples, one per gauge.
    pub fn detailed(&self) -> Vec<SystemMetric> {
        let now = Utc::now();
        let sample = |name: &str, value: f64, labels: &[(&str, &str)], description: &str| {
            SystemMetric {
                name: name.to_string(),
                value,
                labels: labels
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                description: description.to_string(),
                timestamp: now,
            }
        };
        let source = self.ram_source.as_str();

        vec![
            sample("system_cpu_cores", self.cpu_cores as f64, &[], "Number of CPU cores"),
            sample(
                "system_cpu_load_ratio",
                self.cpu_load,
                &[],
                "CPU load ratio (live tasks per core)",
            ),
            sample(
                "system_memory_total_bytes",
                self.ram_total as f64,
                &[("type", "total"), ("source", source)],
                "Total memory in bytes",
            ),
            sample(
                "system_memory_used_bytes",
                self.ram_used as f64,
                &[("type", "used"), ("source", source)],
                "Used memory in bytes",
            ),
            sample(
                "system_memory_free_bytes",
                self.ram_free as f64,
                &[("type", "free"), ("source", source)],
                "Free memory in bytes",
            ),
            sample(
                "system_disk_total_bytes",
                self.disk_total as f64,
                &[("mountpoint", "/"), ("type", "total")],
                "Total disk space in bytes",
            ),
            sample(
                "system_disk_used_bytes",
                self.disk_used as f64,
                &[("mountpoint", "/"), ("type", "used")],
                "Used disk space in bytes",
            ),
            sample(
                "system_disk_free_bytes",
                self.disk_free as f64,
                &[("mountpoint", "/"), ("type", "free")],
                "Free disk space in bytes",
            ),
            sample("system_tasks", self.tasks as f64, &[], "Number of live async tasks"),
            sample(
                "system_process_resident_bytes",
                self.process_resident_bytes as f64,
                &[],
                "Resident memory of the collector process in bytes",
            ),
            sample(
                "system_process_virtual_bytes",
                self.process_virtual_bytes as f64,
                &[],
                "Virtual memory of the collector process in bytes",
            ),
            sample(
                "system_process_run_time_seconds",
                self.process_run_time_secs as f64,
                &[],
                "Run time of the collector process in seconds",
            ),
        ]
    }
}
