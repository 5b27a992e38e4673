//! Configuration management for pgmon
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all application settings. It uses the `figment`
//! crate to layer built-in defaults, an optional `pgmon.toml` file,
//! environment variables and command-line overrides.

use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    value::Uncased,
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::cli::Cli;

/// Configuration file picked up from the working directory when `--config`
/// is not given.
pub const DEFAULT_CONFIG_FILE: &str = "pgmon.toml";

/// Bare environment variables understood for compatibility with existing
/// deployments, and the configuration key each one sets.
const LEGACY_ENV_KEYS: [(&str, &str); 6] = [
    ("VAULT_TOKEN", "vault.token"),
    ("VAULT_ADDR", "vault.address"),
    ("REVIEW_API_URL", "review_api.url"),
    ("PG_LOG_PATH", "log_path"),
    ("ENVIRONMENT", "environment"),
    ("PORT", "server.port"),
];

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// Free-text label of the environment being monitored.
    pub environment: String,
    /// Local PostgreSQL log path, reported alongside collected logs.
    pub log_path: PathBuf,
    /// Secret store settings.
    pub vault: VaultConfig,
    /// Review API settings.
    pub review_api: ReviewApiConfig,
    /// Collector HTTP server settings.
    pub server: ServerConfig,
    /// Server-side log collection settings.
    pub logs: LogsConfig,
    /// Database session settings.
    pub database: DatabaseConfig,
}

/// Secret store (Vault KV v2) settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct VaultConfig {
    /// Base address of the Vault server.
    pub address: String,
    /// Token sent as `X-Vault-Token`.
    pub token: String,
    /// Mount point of the KV v2 engine.
    pub mount: String,
}

/// Review API settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ReviewApiConfig {
    /// Base URL; endpoint paths are appended to it.
    pub url: String,
    /// Client-wide request timeout in seconds.
    pub timeout_secs: u64,
}

/// Collector HTTP server settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Interval for refreshing the `system_*` gauges; zero disables it.
    pub system_metrics_interval_secs: u64,
}

/// Settings for reading logs through the database server.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LogsConfig {
    /// Log directory relative to the data directory, as seen by `pg_ls_dir`.
    pub directory: String,
    /// Default look-back window in seconds.
    pub window_secs: u64,
}

/// Database session settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DatabaseConfig {
    /// Maximum connections held by one session's pool.
    pub max_connections: u32,
    /// Seconds to wait for a connection before giving up.
    pub connect_timeout_secs: u64,
}

impl Config {
    /// Loads the application configuration.
    ///
    /// Sources are merged in increasing priority: defaults, the TOML file
    /// (`--config`, or `pgmon.toml` when present), `PGMON_`-prefixed
    /// variables (`PGMON_REVIEW_API__URL`), the bare legacy variables and
    /// finally the command-line arguments.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        match &cli.config {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("configuration file not found: {}", path.display());
                }
                figment = figment.merge(Toml::file(path));
            }
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                figment = figment.merge(Toml::file(DEFAULT_CONFIG_FILE));
            }
            None => {}
        }

        let keys: Vec<&str> = LEGACY_ENV_KEYS.iter().map(|(var, _)| *var).collect();
        let config: Config = figment
            .merge(Env::prefixed("PGMON_").split("__"))
            .merge(Env::raw().only(&keys).map(|var| {
                LEGACY_ENV_KEYS
                    .iter()
                    .find(|(name, _)| var == *name)
                    .map(|(_, key)| Uncased::from(*key))
                    .unwrap_or_else(|| Uncased::from(var.as_str()))
            }))
            .merge(cli.clone())
            .extract()?;
        Ok(config)
    }

    /// Address the collector server binds to.
    pub fn listen_address(&self) -> Result<SocketAddr> {
        let addr = format!("{}:{}", self.server.host, self.server.port);
        addr.parse()
            .map_err(|e| anyhow::anyhow!("invalid listen address {}: {}", addr, e))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            environment: "production".to_string(),
            log_path: PathBuf::from("/var/log/postgresql"),
            vault: VaultConfig {
                address: "http://localhost:8200".to_string(),
                token: "root".to_string(),
                mount: "secret".to_string(),
            },
            review_api: ReviewApiConfig {
                url: "http://localhost:8000".to_string(),
                timeout_secs: 30,
            },
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                system_metrics_interval_secs: 15,
            },
            logs: LogsConfig {
                directory: "log".to_string(),
                window_secs: 60,
            },
            database: DatabaseConfig {
                max_connections: 2,
                connect_timeout_secs: 10,
            },
        }
    }
}
