//! PostgreSQL sessions.
//!
//! A session is opened from resolved `ConnectionConfig` parameters for one
//! collection run and closed when the run ends. Collectors never talk to
//! `sqlx` directly; they go through the `PgSource` trait so they can be
//! exercised against in-memory fakes.

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::DatabaseConfig;
use crate::secrets::ConnectionConfig;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("invalid connection parameter: {0}")]
    Config(String),

    #[error("db client init failed: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("query {name} failed: {source}")]
    Query {
        name: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

/// Raw result of the server identity query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServerInfoRow {
    pub version: String,
    pub host: Option<String>,
    pub database: String,
}

/// The queries collectors run against one database session.
#[async_trait]
pub trait PgSource: Send + Sync {
    /// `(name, setting)` pairs from `pg_settings` restricted to `names`.
    async fn settings(&self, names: &[&str]) -> Result<Vec<(String, String)>, DbError>;

    /// Server version, address and current database.
    async fn server_info(&self) -> Result<ServerInfoRow, DbError>;

    /// Entries of a server-side directory (`pg_ls_dir`).
    async fn list_dir(&self, dir: &str) -> Result<Vec<String>, DbError>;

    /// Contents of a server-side file (`pg_read_file`).
    async fn read_file(&self, path: &str) -> Result<String, DbError>;

    /// Runs a single-value query returning a `bigint`.
    async fn fetch_i64(&self, sql: &'static str) -> Result<i64, DbError>;

    /// Runs a single-value query returning text.
    async fn fetch_text(&self, sql: &'static str) -> Result<String, DbError>;

    /// Releases the session's connections.
    async fn close(&self) {}
}

/// Opens database sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn PgSource>, DbError>;
}

/// The production `Connector`, backed by a small `sqlx` pool per session.
#[derive(Debug, Clone)]
pub struct PgConnector {
    max_connections: u32,
    acquire_timeout: Duration,
}

impl PgConnector {
    pub fn new(config: &DatabaseConfig) -> Self {
        Self {
            max_connections: config.max_connections.max(1),
            acquire_timeout: Duration::from_secs(config.connect_timeout_secs),
        }
    }
}

/// Translates resolved secret fields into `sqlx` connect options.
pub fn connect_options(config: &ConnectionConfig) -> Result<PgConnectOptions, DbError> {
    let port: u16 = config
        .port
        .parse()
        .map_err(|_| DbError::Config(format!("port {:?} is not a number", config.port)))?;
    let ssl_mode = if config.ssl_mode.is_empty() {
        PgSslMode::Prefer
    } else {
        PgSslMode::from_str(&config.ssl_mode)
            .map_err(|_| DbError::Config(format!("unknown sslmode {:?}", config.ssl_mode)))?
    };

    Ok(PgConnectOptions::new()
        .host(&config.host)
        .port(port)
        .username(&config.username)
        .password(&config.password)
        .database(&config.database)
        .ssl_mode(ssl_mode))
}

#[async_trait]
impl Connector for PgConnector {
    #[instrument(skip_all, fields(host = %config.host, database = %config.database))]
    async fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn PgSource>, DbError> {
        let options = connect_options(config)?;
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(DbError::Connect)?;
        debug!("Database session opened");
        Ok(Box::new(PgSession { pool }))
    }
}

/// One open database session.
pub struct PgSession {
    pool: PgPool,
}

fn query_err(name: &'static str) -> impl FnOnce(sqlx::Error) -> DbError {
    move |source| DbError::Query { name, source }
}

#[async_trait]
impl PgSource for PgSession {
    async fn settings(&self, names: &[&str]) -> Result<Vec<(String, String)>, DbError> {
        let names: Vec<String> = names.iter().map(|name| name.to_string()).collect();
        sqlx::query_as::<_, (String, String)>(
            "SELECT name, setting FROM pg_settings WHERE name = ANY($1)",
        )
        .bind(names)
        .fetch_all(&self.pool)
        .await
        .map_err(query_err("config_parameters"))
    }

    async fn server_info(&self) -> Result<ServerInfoRow, DbError> {
        let (version, host, database) = sqlx::query_as::<_, (String, Option<String>, String)>(
            "SELECT version(), host(inet_server_addr()), current_database()::text",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(query_err("server_info"))?;
        Ok(ServerInfoRow {
            version,
            host,
            database,
        })
    }

    async fn list_dir(&self, dir: &str) -> Result<Vec<String>, DbError> {
        sqlx::query_scalar::<_, String>("SELECT pg_ls_dir($1)")
            .bind(dir)
            .fetch_all(&self.pool)
            .await
            .map_err(query_err("list_log_files"))
    }

    async fn read_file(&self, path: &str) -> Result<String, DbError> {
        sqlx::query_scalar::<_, String>("SELECT pg_read_file($1)")
            .bind(path)
            .fetch_one(&self.pool)
            .await
            .map_err(query_err("read_log_file"))
    }

    async fn fetch_i64(&self, sql: &'static str) -> Result<i64, DbError> {
        sqlx::query_scalar::<_, i64>(sql)
            .fetch_one(&self.pool)
            .await
            .map_err(query_err("fetch_i64"))
    }

    async fn fetch_text(&self, sql: &'static str) -> Result<String, DbError> {
        sqlx::query_scalar::<_, String>(sql)
            .fetch_one(&self.pool)
            .await
            .map_err(query_err("fetch_text"))
    }

    async fn close(&self) {
        if self.pool.is_closed() {
            warn!("Database session already closed");
            return;
        }
        self.pool.close().await;
        debug!("Database session closed");
    }
}
