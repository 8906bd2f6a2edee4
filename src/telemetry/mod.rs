//! Telemetry sink collaborators
//!
//! Fire-and-forget export of the flattened execution trace. Emission never
//! blocks the response path and a failed emit never affects the returned
//! answer: best-effort delivery, no retry, no ordering guarantee.

use crate::trace::FlatTrace;
use crate::Result;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Trace export target. No acknowledgement required.
#[async_trait::async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn emit(&self, trace: &FlatTrace) -> Result<()>;
}

/// POSTs the flattened trace to an external collector.
pub struct HttpTelemetrySink {
    client: Client,
    endpoint: String,
}

impl HttpTelemetrySink {
    pub fn new(base_url: &str) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(4)
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            client,
            endpoint: format!("{}/v1/traces", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait::async_trait]
impl TelemetrySink for HttpTelemetrySink {
    async fn emit(&self, trace: &FlatTrace) -> Result<()> {
        let response = self.client.post(&self.endpoint).json(trace).send().await?;

        if !response.status().is_success() {
            return Err(crate::error::SupportAgentError::TelemetryError(format!(
                "collector returned {}",
                response.status()
            )));
        }

        debug!(correlation_key = %trace.correlation_key, "trace emitted");
        Ok(())
    }
}

/// Writes the trace to the process log instead of a collector. Default
/// sink when no TELEMETRY_BASE_URL is configured.
pub struct LogTelemetrySink;

#[async_trait::async_trait]
impl TelemetrySink for LogTelemetrySink {
    async fn emit(&self, trace: &FlatTrace) -> Result<()> {
        info!(
            correlation_key = %trace.correlation_key,
            fields = trace.string_fields.len() + trace.numeric_fields.len(),
            "trace (log sink)"
        );
        Ok(())
    }
}

/// Pick the sink from the environment.
pub fn build_telemetry_sink() -> Arc<dyn TelemetrySink> {
    match std::env::var("TELEMETRY_BASE_URL") {
        Ok(url) if !url.trim().is_empty() => {
            info!(url = %url, "Telemetry sink: HTTP collector");
            Arc::new(HttpTelemetrySink::new(&url))
        }
        _ => {
            info!("Telemetry sink: process log");
            Arc::new(LogTelemetrySink)
        }
    }
}

/// Detach emission from the response path. Failures are logged at warn
/// and dropped.
pub fn emit_detached(sink: Arc<dyn TelemetrySink>, trace: FlatTrace) {
    tokio::spawn(async move {
        if let Err(e) = sink.emit(&trace).await {
            warn!(
                correlation_key = %trace.correlation_key,
                error = %e,
                "trace emission failed (ignored)"
            );
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn flat() -> FlatTrace {
        FlatTrace {
            correlation_key: "abc-123".to_string(),
            string_fields: BTreeMap::from([("intent".to_string(), "order_status".to_string())]),
            numeric_fields: BTreeMap::from([("total_latency_ms".to_string(), 12.0)]),
        }
    }

    #[test]
    fn test_http_sink_endpoint_normalization() {
        let sink = HttpTelemetrySink::new("http://collector:4318/");
        assert_eq!(sink.endpoint, "http://collector:4318/v1/traces");
    }

    #[tokio::test]
    async fn test_log_sink_accepts_trace() {
        let sink = LogTelemetrySink;
        assert!(sink.emit(&flat()).await.is_ok());
    }

    #[tokio::test]
    async fn test_detached_emit_does_not_block() {
        // The spawned task may or may not have run yet; the call itself
        // must return immediately without an error surface.
        emit_detached(Arc::new(LogTelemetrySink), flat());
    }
}
