//! PostgreSQL log excerpts read through the database server.
//!
//! Log files are listed with `pg_ls_dir` and read with `pg_read_file`, so
//! the collector needs no file-system access to the database host. Both
//! file names and individual lines are filtered against a cutoff time.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{debug, instrument, warn};

use super::CollectError;
use crate::db::{Connector, PgSource};
use crate::secrets::SecretStore;

/// Returned when no line survives the time-window filter.
pub const NO_LOGS_MESSAGE: &str = "No PostgreSQL logs found in the specified time window.";

fn file_timestamp_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{4}-\d{2}-\d{2}_\d{6})").expect("static pattern"))
}

/// Whether `name` looks like a PostgreSQL log file.
pub fn is_log_file(name: &str) -> bool {
    name.ends_with(".log") || name.ends_with(".csv")
}

/// Timestamp embedded in a log file name, e.g. `postgresql-2025-09-06_180000.log`.
pub fn file_timestamp(name: &str) -> Option<DateTime<Utc>> {
    let captures = file_timestamp_re().captures(name)?;
    NaiveDateTime::parse_from_str(&captures[1], "%Y-%m-%d_%H%M%S")
        .ok()
        .map(|t| t.and_utc())
}

/// Keeps the files whose embedded timestamp is at or after `cutoff`.
///
/// Files without a recognisable timestamp are dropped.
pub fn filter_log_files_by_time(files: &[String], cutoff: DateTime<Utc>) -> Vec<String> {
    files
        .iter()
        .filter(|name| matches!(file_timestamp(name), Some(t) if t >= cutoff))
        .cloned()
        .collect()
}

fn parse_utc(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim().trim_matches('"');
    let naive = value.strip_suffix(" UTC")?;
    NaiveDateTime::parse_from_str(naive, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|t| t.and_utc())
}

/// Leading timestamp of a csvlog or stderr log line.
pub fn line_timestamp(line: &str) -> Option<DateTime<Utc>> {
    if let Some((first, _)) = line.split_once(',') {
        if let Some(t) = parse_utc(first) {
            return Some(t);
        }
    }
    let fields: Vec<&str> = line.split_whitespace().take(3).collect();
    if fields.len() < 3 {
        return None;
    }
    parse_utc(&fields.join(" "))
}

/// Trimmed, non-empty lines stamped strictly after `cutoff`.
pub fn filter_log_lines_by_time(content: &str, cutoff: DateTime<Utc>) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| matches!(line_timestamp(line), Some(t) if t > cutoff))
        .map(str::to_string)
        .collect()
}

/// Reads the log lines newer than `cutoff` from the server directory `dir`.
///
/// A file that cannot be read is skipped with a warning; a failed listing
/// aborts the run.
pub async fn collect_logs(
    source: &dyn PgSource,
    dir: &str,
    cutoff: DateTime<Utc>,
) -> Result<String, CollectError> {
    let files: Vec<String> = source
        .list_dir(dir)
        .await
        .map_err(CollectError::ListLogs)?
        .into_iter()
        .filter(|name| is_log_file(name))
        .collect();

    let recent = filter_log_files_by_time(&files, cutoff);
    debug!(total = files.len(), recent = recent.len(), "Log files listed");

    let mut lines = Vec::new();
    for file in &recent {
        let path = format!("{}/{}", dir.trim_end_matches('/'), file);
        match source.read_file(&path).await {
            Ok(content) => lines.extend(filter_log_lines_by_time(&content, cutoff)),
            Err(e) => warn!(file = %path, error = %e, "Failed to read log file, skipping"),
        }
    }

    if lines.is_empty() {
        return Ok(NO_LOGS_MESSAGE.to_string());
    }

    lines.sort_by_key(|line| line_timestamp(line));
    Ok(lines.join("\n"))
}

/// `now - window_secs`, saturating at the earliest representable time.
pub fn window_cutoff(now: DateTime<Utc>, window_secs: u64) -> DateTime<Utc> {
    i64::try_from(window_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Resolves credentials, opens a session and collects recent log lines.
pub struct PgLogsCollector {
    secrets: Arc<dyn SecretStore>,
    connector: Arc<dyn Connector>,
    directory: String,
}

impl PgLogsCollector {
    pub fn new(
        secrets: Arc<dyn SecretStore>,
        connector: Arc<dyn Connector>,
        directory: impl Into<String>,
    ) -> Self {
        Self {
            secrets,
            connector,
            directory: directory.into(),
        }
    }

    /// Collects the lines logged in the last `window_secs` seconds.
    #[instrument(skip(self))]
    pub async fn collect(&self, secret_path: &str, window_secs: u64) -> Result<String, CollectError> {
        let config = self.secrets.connection_config(secret_path).await?;
        let session = self.connector.connect(&config).await?;
        let cutoff = window_cutoff(Utc::now(), window_secs);
        let result = collect_logs(session.as_ref(), &self.directory, cutoff).await;
        session.close().await;
        result
    }
}
