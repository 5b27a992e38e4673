//! Ad-hoc metric collection behind `POST /collect`.
//!
//! One run resolves the credentials for a secret path, opens a database
//! session, evaluates the requested collection functions in order and
//! stores each value in the gauge of the same name. The first failure ends
//! the run; gauges already set stay set.

use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::db::{Connector, DbError, PgSource};
use crate::metrics::{MetricLabels, MetricRegistry, RegistryError};
use crate::secrets::{SecretError, SecretStore};

#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("get DB config from secret store at {path} failed: {source}")]
    Secret {
        path: String,
        #[source]
        source: SecretError,
    },

    #[error(transparent)]
    Connect(DbError),

    #[error("metric {0:?} is not registered")]
    UnknownMetric(String),

    #[error("collect {name:?} failed: {source}")]
    Metric {
        name: String,
        #[source]
        source: DbError,
    },

    #[error("setting gauge for {name:?} failed: {source}")]
    Gauge {
        name: String,
        #[source]
        source: RegistryError,
    },
}

/// Body of a `/collect` request.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CollectRequest {
    pub secret_path: String,
    pub db_name: String,
    pub host: String,
    pub metric_names: Vec<String>,
}

pub struct Collector {
    secrets: Arc<dyn SecretStore>,
    connector: Arc<dyn Connector>,
    registry: Arc<MetricRegistry>,
}

impl Collector {
    pub fn new(
        secrets: Arc<dyn SecretStore>,
        connector: Arc<dyn Connector>,
        registry: Arc<MetricRegistry>,
    ) -> Self {
        Self {
            secrets,
            connector,
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<MetricRegistry> {
        &self.registry
    }

    /// Collects `metric_names` from the database behind `secret_path`.
    ///
    /// Every gauge gets `db_name` and `host` labels; labels returned by the
    /// collection function are added on top.
    #[instrument(skip(self, metric_names), fields(metrics = metric_names.len()))]
    pub async fn collect(
        &self,
        secret_path: &str,
        db_name: &str,
        host: &str,
        metric_names: &[String],
    ) -> Result<(), CollectorError> {
        let config = self
            .secrets
            .connection_config(secret_path)
            .await
            .map_err(|source| CollectorError::Secret {
                path: secret_path.to_string(),
                source,
            })?;
        let session = self
            .connector
            .connect(&config)
            .await
            .map_err(CollectorError::Connect)?;

        let mut result = Ok(());
        for name in metric_names {
            if let Err(e) = self.collect_one(session.as_ref(), db_name, host, name).await {
                result = Err(e);
                break;
            }
        }
        session.close().await;

        if result.is_ok() {
            info!(db_name, host, "Metrics collected");
        }
        result
    }

    async fn collect_one(
        &self,
        session: &dyn PgSource,
        db_name: &str,
        host: &str,
        name: &str,
    ) -> Result<(), CollectorError> {
        let metric = self
            .registry
            .get_metric(name)
            .ok_or_else(|| CollectorError::UnknownMetric(name.to_string()))?;

        let (value, extra) = metric.as_ref()(session)
            .await
            .map_err(|source| CollectorError::Metric {
                name: name.to_string(),
                source,
            })?;

        let mut labels = MetricLabels::from([
            ("db_name".to_string(), db_name.to_string()),
            ("host".to_string(), host.to_string()),
        ]);
        labels.extend(extra);

        self.registry
            .set_gauge(name, &labels, value)
            .map_err(|source| CollectorError::Gauge {
                name: name.to_string(),
                source,
            })?;
        debug!(metric = name, value, "Gauge updated");
        Ok(())
    }
}
