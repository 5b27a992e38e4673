//! # Metric Registry
//!
//! An explicit registry shared by `Arc`, holding two things under one
//! read/write lock:
//!
//! - **collection functions**: metric name to an async function that queries
//!   one database session and returns a value plus extra labels. A name is
//!   registered once; a second registration is rejected.
//! - **metric objects**: Prometheus gauge, counter and histogram vectors,
//!   created lazily on first registration and handed back on every later
//!   registration under the same name.
//!
//! Registration takes the write lock. Updating a value takes the read lock.

pub mod defaults;
pub mod system;

use futures::future::BoxFuture;
use prometheus::{
    CounterVec, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::debug;

use crate::db::{DbError, PgSource};

/// Label set attached to one sample.
pub type MetricLabels = HashMap<String, String>;

pub type MetricFuture<'a> = BoxFuture<'a, Result<(f64, MetricLabels), DbError>>;

/// Collects one metric value from a database session.
pub type MetricFn = Arc<dyn for<'a> Fn(&'a dyn PgSource) -> MetricFuture<'a> + Send + Sync>;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("metric {0} already registered")]
    AlreadyRegistered(String),

    #[error("{kind} {name} not registered")]
    NotRegistered { kind: &'static str, name: String },

    #[error("prometheus: {0}")]
    Prometheus(#[from] prometheus::Error),
}

#[derive(Default)]
struct Inner {
    functions: HashMap<String, MetricFn>,
    gauges: HashMap<String, GaugeVec>,
    counters: HashMap<String, CounterVec>,
    histograms: HashMap<String, HistogramVec>,
}

pub struct MetricRegistry {
    inner: RwLock<Inner>,
    registry: Registry,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricRegistry").finish_non_exhaustive()
    }
}

fn label_refs(labels: &MetricLabels) -> HashMap<&str, &str> {
    labels
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect()
}

impl MetricRegistry {
    /// An empty registry with its own Prometheus exposition registry.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            registry: Registry::new(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers the collection function for `name`.
    pub fn register_metric(&self, name: &str, metric: MetricFn) -> Result<(), RegistryError> {
        let mut inner = self.write();
        if inner.functions.contains_key(name) {
            return Err(RegistryError::AlreadyRegistered(name.to_string()));
        }
        inner.functions.insert(name.to_string(), metric);
        debug!(metric = name, "Registered collection function");
        Ok(())
    }

    pub fn get_metric(&self, name: &str) -> Option<MetricFn> {
        self.read().functions.get(name).cloned()
    }

    /// Names of all registered collection functions, sorted.
    pub fn metric_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().functions.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn register_gauge(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> Result<GaugeVec, RegistryError> {
        let mut inner = self.write();
        if let Some(existing) = inner.gauges.get(name) {
            return Ok(existing.clone());
        }
        let gauge = GaugeVec::new(Opts::new(name, help), label_names)?;
        self.registry.register(Box::new(gauge.clone()))?;
        inner.gauges.insert(name.to_string(), gauge.clone());
        Ok(gauge)
    }

    pub fn register_counter(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> Result<CounterVec, RegistryError> {
        let mut inner = self.write();
        if let Some(existing) = inner.counters.get(name) {
            return Ok(existing.clone());
        }
        let counter = CounterVec::new(Opts::new(name, help), label_names)?;
        self.registry.register(Box::new(counter.clone()))?;
        inner.counters.insert(name.to_string(), counter.clone());
        Ok(counter)
    }

    pub fn register_histogram(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
        buckets: Vec<f64>,
    ) -> Result<HistogramVec, RegistryError> {
        let mut inner = self.write();
        if let Some(existing) = inner.histograms.get(name) {
            return Ok(existing.clone());
        }
        let histogram =
            HistogramVec::new(HistogramOpts::new(name, help).buckets(buckets), label_names)?;
        self.registry.register(Box::new(histogram.clone()))?;
        inner.histograms.insert(name.to_string(), histogram.clone());
        Ok(histogram)
    }

    pub fn set_gauge(
        &self,
        name: &str,
        labels: &MetricLabels,
        value: f64,
    ) -> Result<(), RegistryError> {
        let inner = self.read();
        let gauge = inner.gauges.get(name).ok_or_else(|| RegistryError::NotRegistered {
            kind: "gauge",
            name: name.to_string(),
        })?;
        gauge.get_metric_with(&label_refs(labels))?.set(value);
        Ok(())
    }

    pub fn inc_counter(
        &self,
        name: &str,
        labels: &MetricLabels,
        delta: f64,
    ) -> Result<(), RegistryError> {
        let inner = self.read();
        let counter = inner
            .counters
            .get(name)
            .ok_or_else(|| RegistryError::NotRegistered {
                kind: "counter",
                name: name.to_string(),
            })?;
        counter.get_metric_with(&label_refs(labels))?.inc_by(delta);
        Ok(())
    }

    pub fn observe_histogram(
        &self,
        name: &str,
        labels: &MetricLabels,
        value: f64,
    ) -> Result<(), RegistryError> {
        let inner = self.read();
        let histogram = inner
            .histograms
            .get(name)
            .ok_or_else(|| RegistryError::NotRegistered {
                kind: "histogram",
                name: name.to_string(),
            })?;
        histogram.get_metric_with(&label_refs(labels))?.observe(value);
        Ok(())
    }

    /// Prometheus text exposition of every registered metric.
    pub fn render(&self) -> Result<String, RegistryError> {
        let families = self.registry.gather();
        Ok(TextEncoder::new().encode_to_string(&families)?)
    }
}
