//! Plain-text report files.
//!
//! Each collector's output can be written to a human-readable file. When no
//! path is given the name is `<prefix>_<YYYYmmdd_HHMMSS>.txt` in the working
//! directory.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::collectors::sql_files::SqlFile;
use crate::collectors::system::SystemMetrics;
use crate::models::{Recommendation, ServerData, ServerInfo};

const MB: u64 = 1024 * 1024;
const GB: u64 = 1024 * MB;

/// `<prefix>_<YYYYmmdd_HHMMSS>.txt`
pub fn default_report_path(prefix: &str, now: DateTime<Local>) -> PathBuf {
    PathBuf::from(format!("{}_{}.txt", prefix, now.format("%Y%m%d_%H%M%S")))
}

/// The given path, or a timestamped default for `prefix`.
pub fn report_path(output: Option<&Path>, prefix: &str) -> PathBuf {
    output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_report_path(prefix, Local::now()))
}

fn write_report(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content)
        .with_context(|| format!("failed to write report {}", path.display()))?;
    info!(path = %path.display(), "Report saved");
    Ok(())
}

fn write_recommendation(
    f: &mut fmt::Formatter<'_>,
    recommendation: Option<&Recommendation>,
) -> fmt::Result {
    if let Some(rec) = recommendation {
        writeln!(f, "\nRecommendation:")?;
        writeln!(f, "  Content: {}", rec.content)?;
        writeln!(f, "  Criticality: {}", rec.criticality)?;
        writeln!(f, "  Recommendation: {}", rec.recommendation)?;
    }
    Ok(())
}

pub struct ServerDataReport<'a> {
    pub data: &'a ServerData,
    pub recommendation: Option<&'a Recommendation>,
}

impl fmt::Display for ServerDataReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let info = &self.data.server_info;
        writeln!(f, "PostgreSQL Server Information")?;
        writeln!(f, "============================\n")?;
        writeln!(f, "Version: {}", info.version)?;
        writeln!(f, "Host: {}", info.host)?;
        writeln!(f, "Database: {}", info.database)?;
        writeln!(f, "Environment: {}\n", self.data.environment)?;
        writeln!(f, "Configuration:")?;
        let config = &self.data.config;
        for (name, value) in [
            ("shared_buffers", &config.shared_buffers),
            ("effective_cache_size", &config.effective_cache_size),
            ("maintenance_work_mem", &config.maintenance_work_mem),
            ("checkpoint_completion_target", &config.checkpoint_completion_target),
            ("wal_buffers", &config.wal_buffers),
            ("default_statistics_target", &config.default_statistics_target),
            ("random_page_cost", &config.random_page_cost),
            ("effective_io_concurrency", &config.effective_io_concurrency),
            ("work_mem", &config.work_mem),
            ("min_wal_size", &config.min_wal_size),
            ("max_wal_size", &config.max_wal_size),
        ] {
            writeln!(f, "  {}: {}", name, value)?;
        }
        write_recommendation(f, self.recommendation)
    }
}

pub struct SystemMetricsReport<'a> {
    pub metrics: &'a SystemMetrics,
    pub server_info: Option<&'a ServerInfo>,
    pub recommendation: Option<&'a Recommendation>,
}

impl fmt::Display for SystemMetricsReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.metrics;
        writeln!(f, "System Metrics Report")?;
        writeln!(f, "====================\n")?;
        writeln!(f, "Timestamp: {}\n", m.timestamp.format("%Y-%m-%d %H:%M:%S"))?;
        if let Some(info) = self.server_info {
            writeln!(f, "Server: {} ({}/{})\n", info.version, info.host, info.database)?;
        }
        writeln!(f, "CPU Information:")?;
        writeln!(f, "  Cores: {}", m.cpu_cores)?;
        writeln!(f, "  Load Ratio: {:.2}\n", m.cpu_load)?;
        writeln!(f, "Memory Information ({}):", m.ram_source.as_str())?;
        writeln!(f, "  Total RAM: {} MB", m.ram_total / MB)?;
        writeln!(f, "  Used RAM: {} MB", m.ram_used / MB)?;
        writeln!(f, "  Free RAM: {} MB\n", m.ram_free / MB)?;
        writeln!(f, "Disk Information:")?;
        writeln!(f, "  Total Disk: {} GB", m.disk_total / GB)?;
        writeln!(f, "  Used Disk: {} GB", m.disk_used / GB)?;
        writeln!(f, "  Free Disk: {} GB\n", m.disk_free / GB)?;
        writeln!(f, "Process Information:")?;
        writeln!(f, "  Tasks: {}", m.tasks)?;
        writeln!(f, "  Resident Memory: {} MB", m.process_resident_bytes / MB)?;
        writeln!(f, "  Virtual Memory: {} MB", m.process_virtual_bytes / MB)?;
        writeln!(f, "  Run Time: {} s", m.process_run_time_secs)?;
        write_recommendation(f, self.recommendation)
    }
}

pub struct LogsReport<'a> {
    pub logs: &'a str,
    pub window_secs: u64,
    pub collected_at: DateTime<Local>,
}

impl fmt::Display for LogsReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "PostgreSQL Logs (last {} s, collected {})",
            self.window_secs,
            self.collected_at.format("%Y-%m-%d %H:%M:%S")
        )?;
        writeln!(f, "==================================\n")?;
        writeln!(f, "{}", self.logs)
    }
}

pub struct SqlFilesReport<'a>(pub &'a [SqlFile]);

impl fmt::Display for SqlFilesReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for file in self.0 {
            let marker = if file.is_migration { " (migration)" } else { "" };
            writeln!(f, "----- {}{} -----", file.title, marker)?;
            writeln!(f, "Path: {}\n", file.path.display())?;
            writeln!(f, "{}\n\n", file.content.trim_end())?;
        }
        Ok(())
    }
}

pub fn write_server_data(
    path: &Path,
    data: &ServerData,
    recommendation: Option<&Recommendation>,
) -> Result<()> {
    let report = ServerDataReport {
        data,
        recommendation,
    };
    write_report(path, &report.to_string())
}

pub fn write_system_metrics(
    path: &Path,
    metrics: &SystemMetrics,
    server_info: Option<&ServerInfo>,
    recommendation: Option<&Recommendation>,
) -> Result<()> {
    let report = SystemMetricsReport {
        metrics,
        server_info,
        recommendation,
    };
    write_report(path, &report.to_string())
}

pub fn write_logs(path: &Path, logs: &str, window_secs: u64) -> Result<()> {
    let report = LogsReport {
        logs,
        window_secs,
        collected_at: Local::now(),
    };
    write_report(path, &report.to_string())
}

pub fn write_sql_files(path: &Path, files: &[SqlFile]) -> Result<()> {
    write_report(path, &SqlFilesReport(files).to_string())
}
