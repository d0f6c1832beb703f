//! Prometheus metrics for the Travel Planner
//!
//! - `plan_requests_total` (counter) - plan requests by outcome
//! - `subagent_calls_total` (counter) - fan-out calls by agent and status
//! - `plan_duration_seconds` (histogram) - end-to-end plan duration
//! - `plans_in_flight` (gauge) - plans currently fanning out

use prometheus::{CounterVec, Gauge, Histogram, HistogramOpts, Opts, Registry};
use std::sync::Arc;
use std::time::Instant;

use super::{Result, TelemetryError};

/// Plan outcome label values
pub const OUTCOME_SUCCESS: &str = "success";
pub const OUTCOME_PARTIAL: &str = "partial";
pub const OUTCOME_INVALID: &str = "invalid";

pub struct PlannerMetrics {
    requests_total: CounterVec,
    subagent_calls_total: CounterVec,
    duration_seconds: Histogram,
    in_flight: Gauge,
}

impl PlannerMetrics {
    /// Create the metrics and register them with `registry`
    pub fn new(registry: &Registry) -> Result<Self> {
        let requests_total = CounterVec::new(
            Opts::new("plan_requests_total", "Total number of plan requests"),
            &["outcome"],
        )?;

        let subagent_calls_total = CounterVec::new(
            Opts::new("subagent_calls_total", "Total number of sub-agent calls"),
            &["agent", "status"],
        )?;

        let duration_seconds = Histogram::with_opts(
            HistogramOpts::new("plan_duration_seconds", "Plan duration in seconds")
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        )?;

        let in_flight = Gauge::new("plans_in_flight", "Plans currently fanning out")?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(subagent_calls_total.clone()))?;
        registry.register(Box::new(duration_seconds.clone()))?;
        registry.register(Box::new(in_flight.clone()))?;

        Ok(Self {
            requests_total,
            subagent_calls_total,
            duration_seconds,
            in_flight,
        })
    }

    pub fn record_request(&self, outcome: &str) {
        self.requests_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_call(&self, agent: &str, status: &str) {
        self.subagent_calls_total
            .with_label_values(&[agent, status])
            .inc();
    }

    /// Start a plan timer (records duration on drop)
    pub fn start_timer(&self) -> PlanTimer<'_> {
        self.in_flight.inc();
        PlanTimer {
            start: Instant::now(),
            metrics: self,
        }
    }
}

/// RAII guard for timing plans
pub struct PlanTimer<'a> {
    start: Instant,
    metrics: &'a PlannerMetrics,
}

impl Drop for PlanTimer<'_> {
    fn drop(&mut self) {
        self.metrics
            .duration_seconds
            .observe(self.start.elapsed().as_secs_f64());
        self.metrics.in_flight.dec();
    }
}

/// Registry owning the planner metrics
pub struct MetricsRegistry {
    registry: Registry,
    planner: Arc<PlannerMetrics>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let planner = Arc::new(PlannerMetrics::new(&registry)?);
        Ok(Self { registry, planner })
    }

    pub fn planner(&self) -> Arc<PlannerMetrics> {
        Arc::clone(&self.planner)
    }

    /// Encode metrics as text for scraping
    pub fn encode_text(&self) -> Result<String> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::EncodingError(e.to_string()))
    }
}
