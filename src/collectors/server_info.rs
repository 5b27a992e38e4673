//! Server configuration and identity.

use std::sync::Arc;
use tracing::{debug, instrument};

use super::CollectError;
use crate::db::{Connector, DbError, PgSource};
use crate::models::{PgConfig, ServerData, ServerInfo};
use crate::secrets::SecretStore;

/// Host reported when the server reports no address.
pub const DEFAULT_HOST: &str = "localhost";

/// Reads the allow-listed settings from `pg_settings`.
pub async fn collect_config(source: &dyn PgSource) -> Result<PgConfig, DbError> {
    let mut config = PgConfig::default();
    for (name, setting) in source.settings(&PgConfig::SETTING_NAMES).await? {
        if !config.set(&name, setting) {
            debug!(setting = %name, "Ignoring setting outside the allow-list");
        }
    }
    Ok(config)
}

/// Reads the server version, address and current database.
pub async fn collect_server_info(source: &dyn PgSource) -> Result<ServerInfo, DbError> {
    let row = source.server_info().await?;
    Ok(ServerInfo {
        version: row.version,
        host: row
            .host
            .filter(|host| !host.is_empty())
            .unwrap_or_else(|| DEFAULT_HOST.to_string()),
        database: row.database,
    })
}

/// Builds the full analysis payload.
///
/// An empty `environment` is replaced by `version@host/database`.
pub async fn collect_server_data(
    source: &dyn PgSource,
    environment: &str,
) -> Result<ServerData, DbError> {
    let config = collect_config(source).await?;
    let server_info = collect_server_info(source).await?;
    let environment = if environment.is_empty() {
        format!(
            "{}@{}/{}",
            server_info.version, server_info.host, server_info.database
        )
    } else {
        environment.to_string()
    };
    Ok(ServerData {
        config,
        environment,
        server_info,
    })
}

/// Resolves credentials, opens a session and runs the server collectors.
pub struct ServerInfoCollector {
    secrets: Arc<dyn SecretStore>,
    connector: Arc<dyn Connector>,
}

impl ServerInfoCollector {
    pub fn new(secrets: Arc<dyn SecretStore>, connector: Arc<dyn Connector>) -> Self {
        Self { secrets, connector }
    }

    #[instrument(skip(self))]
    pub async fn collect_server_data(
        &self,
        secret_path: &str,
        environment: &str,
    ) -> Result<ServerData, CollectError> {
        let config = self.secrets.connection_config(secret_path).await?;
        let session = self.connector.connect(&config).await?;
        let result = collect_server_data(session.as_ref(), environment).await;
        session.close().await;
        Ok(result?)
    }

    #[instrument(skip(self))]
    pub async fn collect_server_info(&self, secret_path: &str) -> Result<ServerInfo, CollectError> {
        let config = self.secrets.connection_config(secret_path).await?;
        let session = self.connector.connect(&config).await?;
        let result = collect_server_info(session.as_ref()).await;
        session.close().await;
        Ok(result?)
    }
}
