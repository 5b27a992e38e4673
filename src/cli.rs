//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged with
//! the configuration from the `pgmon.toml` file and environment variables.

use clap::{Args, Parser, Subcommand, ValueEnum};
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

use crate::collectors::sql_files::SearchMode;

/// Collects PostgreSQL configuration, logs, SQL files and host metrics.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "pgmon", author, version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Logging level (trace, debug, info, warn, error).
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Environment label attached to analysis requests.
    #[arg(long, value_name = "NAME", global = true)]
    pub environment: Option<String>,

    /// Base URL of the review API.
    #[arg(long, value_name = "URL", global = true)]
    pub review_url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Collect server configuration and info, send it for analysis.
    Csi(ServerInfoArgs),
    /// Collect system metrics and server info, send them for analysis.
    Csm(ServerInfoArgs),
    /// Collect SQL files and send them for review.
    Csf(SqlFilesArgs),
    /// Collect recent PostgreSQL log lines into a report file.
    Pglogs(LogsArgs),
    /// Run the collector HTTP server (`/collect`, `/metrics`).
    Serve(ServeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServerInfoArgs {
    /// Secret store path holding the database credentials (e.g. `db/app1`).
    #[arg(long = "vp", value_name = "PATH")]
    pub vault_path: String,

    /// Mark the request as originating from a scheduled task.
    #[arg(long = "st")]
    pub scheduled: bool,

    /// Also write the collected data to this report file.
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// File selection mode for `csf`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModeArg {
    /// Every `.sql` file except migrations.
    #[default]
    All,
    /// Only files under the migrations directory.
    Migrations,
    /// Only the files named with `--files`.
    Specific,
}

#[derive(Args, Debug, Clone)]
pub struct SqlFilesArgs {
    /// Directory to scan.
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    /// Search mode.
    #[arg(long, value_enum, default_value_t = ModeArg::All)]
    pub mode: ModeArg,

    /// Migrations directory (used with `--mode migrations`).
    #[arg(long, value_name = "PATH")]
    pub migrations_path: Option<PathBuf>,

    /// File names to collect (used with `--mode specific`).
    #[arg(long, value_delimiter = ',')]
    pub files: Vec<String>,

    /// Enable the ignore list.
    #[arg(long)]
    pub enable_ignore: bool,

    /// File names to skip when the ignore list is enabled.
    #[arg(long, value_delimiter = ',')]
    pub ignore: Vec<String>,

    /// Write the collected files to this report file.
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Only collect; do not call the review API.
    #[arg(long)]
    pub no_review: bool,
}

impl SqlFilesArgs {
    pub fn search_mode(&self) -> SearchMode {
        match self.mode {
            ModeArg::All => SearchMode::All,
            ModeArg::Migrations => SearchMode::MigrationsOnly,
            ModeArg::Specific => SearchMode::Specific,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct LogsArgs {
    /// Secret store path holding the database credentials.
    #[arg(long = "vp", value_name = "PATH")]
    pub vault_path: String,

    /// Log time window in seconds.
    #[arg(long = "lgt", value_name = "SECONDS")]
    pub window_secs: Option<u64>,

    /// Report file (auto-generated when omitted).
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Port to listen on.
    #[arg(long)]
    pub port: Option<u16>,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        if let Some(environment) = &self.environment {
            dict.insert("environment".into(), Value::from(environment.clone()));
        }

        if let Some(url) = &self.review_url {
            let mut review_api = Dict::new();
            review_api.insert("url".into(), Value::from(url.clone()));
            dict.insert("review_api".into(), Value::from(review_api));
        }

        if let Some(Command::Serve(ServeArgs { port: Some(port) })) = &self.command {
            let mut server = Dict::new();
            server.insert("port".into(), Value::from(*port));
            dict.insert("server".into(), Value::from(server));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
