//! Database credential resolution from a KV secret store.
//!
//! Credentials live in HashiCorp Vault's KV v2 engine. A logical path such
//! as `db/app1` is read from `{address}/v1/{mount}/data/{path}` and must
//! carry string-valued `Host`, `Port`, `Username`, `Password`, `Database`
//! and `SSLMode` fields.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::VaultConfig;

const SECRET_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum SecretError {
    #[error("secret store token is empty")]
    MissingToken,

    #[error("secret store request for {path} failed: {source}")]
    Request {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("secret store returned status {status} for {path}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },

    #[error("key {0:?} not found")]
    MissingField(&'static str),

    #[error("key {0:?} found but not a string")]
    NotAString(&'static str),
}

/// Connection parameters for one PostgreSQL database.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: String,
    pub username: String,
    pub password: String,
    pub database: String,
    pub ssl_mode: String,
}

// Keeps the password out of logs.
impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("database", &self.database)
            .field("ssl_mode", &self.ssl_mode)
            .finish_non_exhaustive()
    }
}

impl ConnectionConfig {
    /// Builds a config from a secret's key/value data.
    pub fn from_secret_data(data: &Map<String, Value>) -> Result<Self, SecretError> {
        Ok(Self {
            host: string_field(data, "Host")?,
            port: string_field(data, "Port")?,
            username: string_field(data, "Username")?,
            password: string_field(data, "Password")?,
            database: string_field(data, "Database")?,
            ssl_mode: string_field(data, "SSLMode")?,
        })
    }
}

fn string_field(data: &Map<String, Value>, key: &'static str) -> Result<String, SecretError> {
    match data.get(key) {
        Some(Value::String(value)) => Ok(value.clone()),
        Some(_) => Err(SecretError::NotAString(key)),
        None => Err(SecretError::MissingField(key)),
    }
}

/// Looks up database credentials by logical path.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn connection_config(&self, path: &str) -> Result<ConnectionConfig, SecretError>;
}

/// A `SecretStore` backed by Vault's KV v2 HTTP API.
pub struct VaultClient {
    address: String,
    token: String,
    mount: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct KvResponse {
    data: KvData,
}

#[derive(Deserialize)]
struct KvData {
    data: Map<String, Value>,
}

impl VaultClient {
    /// Creates a client; fails when no token is configured.
    pub fn new(config: &VaultConfig) -> Result<Self, SecretError> {
        if config.token.is_empty() {
            return Err(SecretError::MissingToken);
        }
        let http = reqwest::Client::builder()
            .timeout(SECRET_TIMEOUT)
            .build()
            .map_err(|source| SecretError::Request {
                path: String::new(),
                source,
            })?;
        Ok(Self {
            address: config.address.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            mount: config.mount.trim_matches('/').to_string(),
            http,
        })
    }

    fn secret_url(&self, path: &str) -> String {
        format!(
            "{}/v1/{}/data/{}",
            self.address,
            self.mount,
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl SecretStore for VaultClient {
    #[instrument(skip(self))]
    async fn connection_config(&self, path: &str) -> Result<ConnectionConfig, SecretError> {
        let url = self.secret_url(path);
        debug!(%url, "Reading database secret");

        let request_err = |source: reqwest::Error| SecretError::Request {
            path: path.to_string(),
            source,
        };
        let response = self
            .http
            .get(&url)
            .header("X-Vault-Token", &self.token)
            .send()
            .await
            .map_err(request_err)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SecretError::Status {
                path: path.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let secret: KvResponse = response.json().await.map_err(request_err)?;
        ConnectionConfig::from_secret_data(&secret.data.data)
    }
}
