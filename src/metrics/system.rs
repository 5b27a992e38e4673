//! Periodic export of host metrics as `system_*` gauges.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time;
use tracing::{trace, warn};

use super::{MetricLabels, MetricRegistry, RegistryError};
use crate::collectors::system::{SystemCollector, SystemMetric};

/// Registers (on first use) and sets one gauge per sample.
pub fn record_system_metrics(
    registry: &MetricRegistry,
    samples: &[SystemMetric],
) -> Result<(), RegistryError> {
    for sample in samples {
        let label_names: Vec<&str> = sample.labels.keys().map(String::as_str).collect();
        registry.register_gauge(&sample.name, &sample.description, &label_names)?;
        let labels: MetricLabels = sample
            .labels
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        registry.set_gauge(&sample.name, &labels, sample.value)?;
    }
    Ok(())
}

/// Background task refreshing the `system_*` gauges.
pub struct SystemMetricsExporter {
    collector: SystemCollector,
    registry: Arc<MetricRegistry>,
    interval: Duration,
    shutdown_rx: watch::Receiver<bool>,
}

impl SystemMetricsExporter {
    pub fn new(
        registry: Arc<MetricRegistry>,
        interval: Duration,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            collector: SystemCollector::new(),
            registry,
            interval,
            shutdown_rx,
        }
    }

    /// Runs until the shutdown channel fires.
    pub async fn run(mut self) {
        let mut interval = time::interval(self.interval);
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown_rx.changed() => {
                    trace!("System metrics exporter received shutdown signal.");
                    break;
                }
                _ = interval.tick() => {
                    let samples = self.collector.collect().detailed();
                    if let Err(e) = record_system_metrics(&self.registry, &samples) {
                        warn!(error = %e, "Failed to record system metrics");
                    }
                }
            }
        }
    }
}
