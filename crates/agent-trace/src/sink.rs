//! Span emission to the telemetry sink.
//!
//! Emission never blocks the caller: spans are queued on a bounded channel
//! and a background task logs them and, when an endpoint is configured,
//! forwards them as JSON. A full queue drops the span with a warning.

use serde::Serialize;
use std::env;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::span::Span;

/// Destination for closed span trees.
pub trait SpanSink: Send + Sync {
    /// Hand a closed span tree to the sink. Must not block.
    fn emit(&self, span: Span);
}

/// Sink configuration
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Service name attached to every exported batch
    pub service_name: String,

    /// Collector endpoint; spans are only logged when unset
    pub endpoint: Option<String>,

    /// Maximum queue size for buffered spans
    pub max_queue_size: usize,

    /// Export timeout in milliseconds
    pub timeout_ms: u64,
}

impl SinkConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            endpoint: None,
            max_queue_size: 1000,
            timeout_ms: 5000,
        }
    }

    /// Create config from environment variables
    pub fn from_env(service_name: impl Into<String>) -> Self {
        let defaults = Self::new(service_name);
        Self {
            endpoint: env::var("SPAN_SINK_URL").ok().filter(|v| !v.is_empty()),
            max_queue_size: env::var("SPAN_SINK_QUEUE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_queue_size),
            timeout_ms: env::var("SPAN_SINK_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_ms),
            ..defaults
        }
    }

    /// Set the collector endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

/// Queue-backed sink drained by a background task.
pub struct ChannelSink {
    sender: mpsc::Sender<Span>,
}

impl ChannelSink {
    /// Create the sink and spawn its background task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: SinkConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.max_queue_size.max(1));
        tokio::spawn(Self::background_exporter(config, receiver));
        Self { sender }
    }

    async fn background_exporter(config: SinkConfig, mut receiver: mpsc::Receiver<Span>) {
        let exporter = config
            .endpoint
            .as_ref()
            .map(|url| SpanExporter::new(url, Duration::from_millis(config.timeout_ms)));

        while let Some(span) = receiver.recv().await {
            info!(
                service = %config.service_name,
                trace_id = %span.context.trace_id,
                span_id = %span.context.span_id,
                name = %span.name,
                status = ?span.status,
                duration_ms = span.duration_ms.unwrap_or_default(),
                spans = span.flatten().len(),
                "Span closed"
            );

            if let Some(exporter) = &exporter {
                if let Err(e) = exporter.export(&config.service_name, &span).await {
                    error!(error = %e, "Failed to export span tree");
                }
            }
        }

        debug!("Span queue closed, exporter stopping");
    }
}

impl SpanSink for ChannelSink {
    fn emit(&self, span: Span) {
        if let Err(e) = self.sender.try_send(span) {
            warn!(error = %e, "Span queue unavailable, dropping span");
        }
    }
}

/// HTTP exporter for span batches.
struct SpanExporter {
    url: String,
    client: reqwest::Client,
    timeout: Duration,
}

#[derive(Serialize)]
struct ExportBatch<'a> {
    service_name: &'a str,
    span_count: usize,
    root: &'a Span,
}

impl SpanExporter {
    fn new(url: &str, timeout: Duration) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            timeout,
        }
    }

    async fn export(&self, service_name: &str, span: &Span) -> Result<(), String> {
        let batch = ExportBatch {
            service_name,
            span_count: span.flatten().len(),
            root: span,
        };

        let response = self
            .client
            .post(format!("{}/v1/spans", self.url))
            .json(&batch)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| format!("HTTP error: {}", e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("Collector returned error: {}", response.status()))
        }
    }
}

/// In-memory sink that retains every emitted tree.
#[derive(Default)]
pub struct MemorySink {
    spans: Mutex<Vec<Span>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the emitted trees.
    pub fn spans(&self) -> Vec<Span> {
        self.spans.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Remove and return the emitted trees.
    pub fn take(&self) -> Vec<Span> {
        self.spans
            .lock()
            .map(|mut g| std::mem::take(&mut *g))
            .unwrap_or_default()
    }
}

impl SpanSink for MemorySink {
    fn emit(&self, span: Span) {
        if let Ok(mut guard) = self.spans.lock() {
            guard.push(span);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TraceContext;
    use crate::span::SpanKind;

    #[test]
    fn test_default_config() {
        let config = SinkConfig::new("weather-agent");
        assert_eq!(config.service_name, "weather-agent");
        assert!(config.endpoint.is_none());
        assert_eq!(config.max_queue_size, 1000);
    }

    #[test]
    fn test_with_endpoint() {
        let config = SinkConfig::new("canary").with_endpoint("http://collector:4318");
        assert_eq!(config.endpoint.as_deref(), Some("http://collector:4318"));
    }

    #[test]
    fn test_memory_sink_retains_spans() {
        let sink = MemorySink::new();
        sink.emit(Span::start(TraceContext::root(), "a", SpanKind::Server));
        sink.emit(Span::start(TraceContext::root(), "b", SpanKind::Server));

        assert_eq!(sink.spans().len(), 2);
        assert_eq!(sink.take().len(), 2);
        assert!(sink.spans().is_empty());
    }

    #[tokio::test]
    async fn test_channel_sink_does_not_block_when_full() {
        let mut config = SinkConfig::new("test");
        config.max_queue_size = 1;
        let sink = ChannelSink::new(config);

        for _ in 0..100 {
            sink.emit(Span::start(TraceContext::root(), "burst", SpanKind::Internal));
        }
    }
}
