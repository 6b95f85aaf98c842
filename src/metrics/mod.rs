//! Metrics Module for the Audio Analysis API
//!
//! A pluggable metrics system: the [`MetricsExporter`] trait is implemented by a
//! Prometheus exporter and by a no-op exporter used when metrics are disabled.
//! [`Metrics`] wraps the selected exporter and offers recorders for the events
//! the API cares about. Recording never fails the caller; errors are logged.

pub mod error;
pub mod null;
pub mod prometheus;

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};

pub use self::error::MetricsError;
use self::null::NullExporter;
use self::prometheus::PrometheusExporter;

/// Metrics exporter trait for pluggable monitoring systems
#[async_trait]
pub trait MetricsExporter: Send + Sync {
    /// Increment a counter metric
    async fn increment(&self, name: &str, labels: &[(&str, &str)]) -> Result<(), MetricsError>;

    /// Observe a value in a histogram metric
    async fn observe_histogram(
        &self,
        name: &str,
        value: f64,
        labels: &[(&str, &str)],
    ) -> Result<(), MetricsError>;

    /// Export metrics in the format expected by the monitoring system
    async fn export(&self) -> Result<Vec<u8>, MetricsError>;
}

/// Cloneable handle on the configured exporter
#[derive(Clone)]
pub struct Metrics {
    exporter: Arc<dyn MetricsExporter>,
}

impl Metrics {
    pub fn new(exporter: Arc<dyn MetricsExporter>) -> Self {
        Self { exporter }
    }

    pub async fn export(&self) -> Result<Vec<u8>, MetricsError> {
        self.exporter.export().await
    }

    async fn increment(&self, name: &str, labels: &[(&str, &str)]) {
        if let Err(e) = self.exporter.increment(name, labels).await {
            warn!("Failed to increment counter '{}': {}", name, e);
        }
    }

    async fn observe_histogram(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        if let Err(e) = self.exporter.observe_histogram(name, value, labels).await {
            warn!("Failed to observe histogram '{}': {}", name, e);
        }
    }

    /// Record HTTP request count and duration
    pub async fn record_http_request(&self, method: &str, route: &str, status: &str, duration: f64) {
        let labels = [("method", method), ("route", route), ("status", status)];
        self.observe_histogram("http_request_duration_seconds", duration, &labels)
            .await;
        self.increment("http_requests_total", &labels).await;
    }

    /// Record a transcription job reaching a terminal state; `status` is "success" or "failed"
    pub async fn record_job_completed(&self, model: &str, status: &str, duration: f64) {
        let labels = [("model", model), ("status", status)];
        self.observe_histogram("transcription_job_duration_seconds", duration, &labels)
            .await;
        self.increment("transcription_jobs_total", &labels).await;
    }

    /// Record the size of a downloaded audio file
    pub async fn record_download_size(&self, size_bytes: f64) {
        self.observe_histogram("audio_download_size_bytes", size_bytes, &[])
            .await;
    }
}

/// Factory function to create metrics exporter based on configuration
pub fn create_metrics_exporter(exporter_type: &str) -> Arc<dyn MetricsExporter> {
    match exporter_type.to_lowercase().as_str() {
        "prometheus" => {
            debug!("Initializing Prometheus metrics exporter");
            Arc::new(PrometheusExporter::new())
        }
        "none" | "null" | "disabled" => {
            debug!("Metrics disabled, using null exporter");
            create_null_exporter()
        }
        other => {
            warn!("Unknown metrics exporter type '{}', using null exporter", other);
            create_null_exporter()
        }
    }
}

pub fn create_null_exporter() -> Arc<dyn MetricsExporter> {
    Arc::new(NullExporter)
}
