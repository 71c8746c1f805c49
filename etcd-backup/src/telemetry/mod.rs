//! Telemetry Sink: per-target outcome export.

pub mod pushgateway;

use crate::config::TelemetryConfig;
use crate::models::BackupOutcome;
use crate::utils::TelemetryError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub use pushgateway::PushGatewaySink;

#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Export one outcome. `Ok(false)` means the sink is disabled and nothing was sent.
    async fn record(&self, outcome: &BackupOutcome) -> Result<bool, TelemetryError>;
}

/// Sink used when no push gateway is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledSink;

#[async_trait]
impl TelemetrySink for DisabledSink {
    async fn record(&self, _outcome: &BackupOutcome) -> Result<bool, TelemetryError> {
        Ok(false)
    }
}

/// A push-gateway sink when a URL is configured, otherwise [`DisabledSink`].
pub fn from_config(config: &TelemetryConfig) -> Result<Arc<dyn TelemetrySink>, TelemetryError> {
    match config.pushgateway_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => Ok(Arc::new(PushGatewaySink::new(url, &config.job)?)),
        _ => {
            info!("No push gateway configured, telemetry disabled");
            Ok(Arc::new(DisabledSink))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_sink_reports_not_sent() {
        let sent = DisabledSink.record(&BackupOutcome::failed("c1")).await.unwrap();
        assert!(!sent);
    }

    #[tokio::test]
    async fn test_absent_url_disables_telemetry() {
        let config = TelemetryConfig {
            pushgateway_url: Some("  ".to_string()),
            ..TelemetryConfig::default()
        };
        let sink = from_config(&config).unwrap();
        assert!(!sink.record(&BackupOutcome::failed("")).await.unwrap());
    }
}
