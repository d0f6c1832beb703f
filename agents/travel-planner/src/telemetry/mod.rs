//! Telemetry module for the Travel Planner
//!
//! - `metrics` - Prometheus metrics for plan requests and sub-agent calls
//!
//! Spans are emitted through `agent_trace::SpanSink`.

pub mod metrics;

pub use metrics::{MetricsRegistry, PlannerMetrics};

use thiserror::Error;

/// Telemetry errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Metrics error: {0}")]
    MetricsError(#[from] prometheus::Error),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;
