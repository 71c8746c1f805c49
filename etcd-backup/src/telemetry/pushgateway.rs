//! Prometheus push-gateway sink.
//!
//! Metrics live in a registry owned by the sink, so their lifetime is one run.
//! Each outcome updates the registry and pushes it with POST ("add" semantics:
//! only metrics with the same name in the job's group are replaced).

use super::TelemetrySink;
use crate::models::BackupOutcome;
use crate::utils::TelemetryError;
use async_trait::async_trait;
use prometheus::{CounterVec, Encoder, GaugeVec, Opts, Registry, TextEncoder};
use tracing::debug;

const NAMESPACE: &str = "etcd_backup";
const CLUSTER_LABEL: &str = "tenant_cluster_id";

struct BackupMetrics {
    creation_time: GaugeVec,
    encryption_time: GaugeVec,
    upload_time: GaugeVec,
    size: GaugeVec,
    success: CounterVec,
    failure: CounterVec,
}

impl BackupMetrics {
    fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let gauge = |name: &str, help: &str| -> Result<GaugeVec, prometheus::Error> {
            let g = GaugeVec::new(Opts::new(name, help).namespace(NAMESPACE), &[CLUSTER_LABEL])?;
            registry.register(Box::new(g.clone()))?;
            Ok(g)
        };
        let counter = |name: &str, help: &str| -> Result<CounterVec, prometheus::Error> {
            let c = CounterVec::new(Opts::new(name, help).namespace(NAMESPACE), &[CLUSTER_LABEL])?;
            registry.register(Box::new(c.clone()))?;
            Ok(c)
        };

        Ok(Self {
            creation_time: gauge("creation_time_ms", "Gauge about the time in ms spent by the etcd backup creation process.")?,
            encryption_time: gauge("encryption_time_ms", "Gauge about the time in ms spent by the etcd backup encryption process.")?,
            upload_time: gauge("upload_time_ms", "Gauge about the time in ms spent by the etcd backup upload process.")?,
            size: gauge("size_bytes", "Gauge about the size of the backup file, as seen by S3.")?,
            success: counter("success_count", "Count of successful backups.")?,
            failure: counter("failure_count", "Count of failed backups.")?,
        })
    }

    fn observe(&self, outcome: &BackupOutcome) {
        let labels = [outcome.target_id.as_str()];
        if outcome.success {
            self.creation_time.with_label_values(&labels).set(outcome.creation_ms as f64);
            self.encryption_time.with_label_values(&labels).set(outcome.encryption_ms as f64);
            self.upload_time.with_label_values(&labels).set(outcome.upload_ms as f64);
            self.size.with_label_values(&labels).set(outcome.size_bytes as f64);
            self.success.with_label_values(&labels).inc();
        } else {
            self.failure.with_label_values(&labels).inc();
        }
    }
}

pub struct PushGatewaySink {
    push_url: String,
    client: reqwest::Client,
    registry: Registry,
    metrics: BackupMetrics,
}

impl PushGatewaySink {
    pub fn new(url: &str, job: &str) -> Result<Self, TelemetryError> {
        let registry = Registry::new();
        let metrics = BackupMetrics::register(&registry)?;

        Ok(Self {
            push_url: format!("{}/metrics/job/{}", url.trim_end_matches('/'), job),
            client: reqwest::Client::new(),
            registry,
            metrics,
        })
    }

    pub fn push_url(&self) -> &str {
        &self.push_url
    }

    /// Text exposition of everything recorded so far.
    pub fn render(&self) -> Result<String, TelemetryError> {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        encoder.encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

#[async_trait]
impl TelemetrySink for PushGatewaySink {
    async fn record(&self, outcome: &BackupOutcome) -> Result<bool, TelemetryError> {
        self.metrics.observe(outcome);
        let body = self.render()?;

        let resp = self
            .client
            .post(&self.push_url)
            .header(reqwest::header::CONTENT_TYPE, TextEncoder::new().format_type())
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TelemetryError::Rejected {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        debug!(cluster = %outcome.target_id, success = outcome.success, "Pushed backup metrics");
        Ok(true)
    }
}
