//! Prometheus exporter
//!
//! Metric families are created on first use, keyed by name, and live in a
//! registry owned by the exporter.

use std::collections::HashMap;

use async_trait::async_trait;
use log::debug;
use prometheus::core::Collector;
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use tokio::sync::Mutex;

use crate::metrics::error::{validation, MetricsError};
use crate::metrics::MetricsExporter;

type Families<T> = Mutex<HashMap<String, T>>;

pub struct PrometheusExporter {
    registry: Registry,
    counters: Families<CounterVec>,
    histograms: Families<HistogramVec>,
}

impl Default for PrometheusExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl PrometheusExporter {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            counters: Mutex::default(),
            histograms: Mutex::default(),
        }
    }

    /// Return the family called `name`, creating and registering it when missing
    async fn family<T, F>(
        &self,
        families: &Families<T>,
        name: &str,
        build: F,
    ) -> Result<T, MetricsError>
    where
        T: Collector + Clone + 'static,
        F: FnOnce() -> prometheus::Result<T>,
    {
        let mut families = families.lock().await;
        if let Some(family) = families.get(name) {
            return Ok(family.clone());
        }

        let family = build().map_err(|e| MetricsError::registration_failed(name, e.to_string()))?;
        self.registry
            .register(Box::new(family.clone()))
            .map_err(|e| MetricsError::registration_failed(name, e.to_string()))?;
        debug!("Registered Prometheus metric {}", name);
        families.insert(name.to_string(), family.clone());
        Ok(family)
    }
}

/// Bucket bounds for a histogram, chosen from the unit in its name
fn histogram_buckets(name: &str) -> Vec<f64> {
    if name.ends_with("_bytes") {
        // 64 KiB to 1 GiB
        vec![
            65536.0, 262144.0, 1048576.0, 4194304.0, 16777216.0, 67108864.0, 268435456.0,
            1073741824.0,
        ]
    } else if name.starts_with("transcription_job") {
        // Batch jobs take from seconds to an hour
        vec![5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1200.0, 1800.0, 3600.0]
    } else if name.ends_with("_seconds") {
        // Request latency, up to an hour
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0, 3600.0]
    } else {
        prometheus::DEFAULT_BUCKETS.to_vec()
    }
}

/// Validate and split `(key, value)` pairs into label names and values
fn prepare<'a>(
    name: &str,
    labels: &'a [(&'a str, &'a str)],
) -> Result<(Vec<&'a str>, Vec<&'a str>), MetricsError> {
    validation::validate_metric_name(name)?;
    validation::validate_labels(labels)?;
    Ok(labels.iter().copied().unzip())
}

#[async_trait]
impl MetricsExporter for PrometheusExporter {
    async fn increment(&self, name: &str, labels: &[(&str, &str)]) -> Result<(), MetricsError> {
        let (keys, values) = prepare(name, labels)?;
        let counters = self
            .family(&self.counters, name, || {
                CounterVec::new(Opts::new(name, name), &keys)
            })
            .await?;
        counters
            .get_metric_with_label_values(&values)
            .map_err(|e| MetricsError::invalid_label(name, e.to_string()))?
            .inc();
        Ok(())
    }

    async fn observe_histogram(
        &self,
        name: &str,
        value: f64,
        labels: &[(&str, &str)],
    ) -> Result<(), MetricsError> {
        validation::validate_numeric_value(value)?;
        let (keys, values) = prepare(name, labels)?;
        let histograms = self
            .family(&self.histograms, name, || {
                let opts = HistogramOpts::new(name, name).buckets(histogram_buckets(name));
                HistogramVec::new(opts, &keys)
            })
            .await?;
        histograms
            .get_metric_with_label_values(&values)
            .map_err(|e| MetricsError::invalid_label(name, e.to_string()))?
            .observe(value);
        Ok(())
    }

    async fn export(&self) -> Result<Vec<u8>, MetricsError> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| MetricsError::ExportFailed(e.to_string()))?;
        Ok(buffer)
    }
}
