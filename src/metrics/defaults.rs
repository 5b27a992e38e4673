//! Built-in database metrics.
//!
//! Each default metric has a collection function and a gauge. Collection
//! functions only return the labels they discover themselves; `db_name` and
//! `host` come from the caller of `/collect`.

use std::sync::Arc;

use super::{MetricFuture, MetricLabels, MetricRegistry, RegistryError};
use crate::db::PgSource;

pub const ACTIVE_CONNECTIONS: &str = "db_active_connections";
pub const PG_VERSION: &str = "db_pg_version";

pub const ACTIVE_CONNECTIONS_SQL: &str = "SELECT count(*) FROM pg_stat_activity";
pub const SERVER_VERSION_SQL: &str = "SHOW server_version";

/// Labels every collected gauge carries.
pub const BASE_LABELS: [&str; 2] = ["db_name", "host"];

fn active_connections(source: &dyn PgSource) -> MetricFuture<'_> {
    Box::pin(async move {
        let count = source.fetch_i64(ACTIVE_CONNECTIONS_SQL).await?;
        Ok((count as f64, MetricLabels::new()))
    })
}

fn pg_version(source: &dyn PgSource) -> MetricFuture<'_> {
    Box::pin(async move {
        let version = source.fetch_text(SERVER_VERSION_SQL).await?;
        let labels = MetricLabels::from([("version".to_string(), version)]);
        Ok((1.0, labels))
    })
}

/// Registers the default gauges and their collection functions.
pub fn register_default_metrics(registry: &MetricRegistry) -> Result<(), RegistryError> {
    registry.register_gauge(
        ACTIVE_CONNECTIONS,
        "Number of active PostgreSQL connections",
        &BASE_LABELS,
    )?;
    registry.register_metric(ACTIVE_CONNECTIONS, Arc::new(active_connections))?;

    registry.register_gauge(
        PG_VERSION,
        "PostgreSQL server version",
        &["db_name", "host", "version"],
    )?;
    registry.register_metric(PG_VERSION, Arc::new(pg_version))?;
    Ok(())
}
