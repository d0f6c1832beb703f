//! Fan-out planning engine
//!
//! Calls every configured sub-agent concurrently, bounds each call by its
//! own timeout, waits for all of them and folds the outcomes into one
//! `PlanResponse`. Sub-agent failures never fail the plan; only invalid
//! requests do.

mod caller;
mod collector;

pub use caller::*;
pub use collector::*;

use agent_faults::{DirectiveError, FaultDirective, FaultKind};
use agent_trace::{inject, Span, SpanKind, TraceContext};
use rand::Rng;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use sub_agent::client::ClientError;
use sub_agent::{AgentStatus, InvokeRequest, SubAgentResult};
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::contracts::*;
use crate::telemetry::metrics::{PlannerMetrics, OUTCOME_PARTIAL, OUTCOME_SUCCESS};

pub const AGENT_ID: &str = "travel-planner-001";
pub const AGENT_NAME: &str = "Travel Planner";

/// Planner configuration
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Per-call timeout for every sub-agent
    pub call_timeout: Duration,

    /// Per-call timeout under `fan_out_timeout`
    pub fan_out_timeout: Duration,

    /// Default sleep for an orchestrator-level `high_latency`
    pub default_delay: Duration,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_millis(30_000),
            fan_out_timeout: Duration::from_millis(1),
            default_delay: Duration::from_millis(3000),
        }
    }
}

/// Validation failures; the only errors `plan` surfaces.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlanError {
    #[error("destination must not be empty")]
    EmptyDestination,

    #[error("unknown sub-agent '{0}' in fault directives")]
    UnknownAgent(String),

    #[error("invalid fault for '{target}': {source}")]
    InvalidFault {
        target: String,
        #[source]
        source: DirectiveError,
    },
}

/// A configured sub-agent
#[derive(Clone)]
pub struct AgentSlot {
    pub name: String,
    pub caller: Arc<dyn SubAgentCaller>,
}

/// Result of one plan, with the closed top-level span tree.
pub struct PlanOutcome {
    pub response: PlanResponse,
    pub span: Span,
}

pub struct Planner {
    agents: Vec<AgentSlot>,
    config: PlannerConfig,
    metrics: Option<Arc<PlannerMetrics>>,
}

impl Planner {
    pub fn new(config: PlannerConfig) -> Self {
        Self {
            agents: Vec::new(),
            config,
            metrics: None,
        }
    }

    /// Add a sub-agent; call order of configuration fixes error order.
    pub fn with_agent(mut self, name: impl Into<String>, caller: Arc<dyn SubAgentCaller>) -> Self {
        self.agents.push(AgentSlot {
            name: name.into(),
            caller,
        });
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<PlannerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn agent_names(&self) -> Vec<String> {
        self.agents.iter().map(|a| a.name.clone()).collect()
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Reject malformed input before any span is opened.
    pub fn validate(&self, request: &PlanRequest) -> Result<(), PlanError> {
        if request.destination.trim().is_empty() {
            return Err(PlanError::EmptyDestination);
        }

        let Some(faults) = &request.fault else {
            return Ok(());
        };

        for (agent, directive) in faults.agent_directives() {
            if !self.agents.iter().any(|a| a.name == agent) {
                return Err(PlanError::UnknownAgent(agent.to_string()));
            }
            directive
                .validate_for_agent()
                .map_err(|source| PlanError::InvalidFault {
                    target: agent.to_string(),
                    source,
                })?;
        }

        if let Some(directive) = &faults.orchestrator {
            directive
                .validate_for_orchestrator()
                .map_err(|source| PlanError::InvalidFault {
                    target: "orchestrator".to_string(),
                    source,
                })?;
        }

        Ok(())
    }

    /// Plan a trip to `request.destination` under `ctx`.
    pub async fn plan(&self, request: &PlanRequest, ctx: TraceContext) -> Result<PlanOutcome, PlanError> {
        self.validate(request)?;

        let _timer = self.metrics.as_ref().map(|m| m.start_timer());
        let destination = request.destination.trim();

        let mut root = Span::start(ctx, "invoke_agent travel-planner", SpanKind::Server)
            .with_attribute("gen_ai.operation.name", "invoke_agent")
            .with_attribute("gen_ai.agent.id", AGENT_ID)
            .with_attribute("gen_ai.agent.name", AGENT_NAME)
            .with_attribute("destination", destination);

        let orchestrator_fault = request
            .fault
            .as_ref()
            .and_then(|f| f.orchestrator.as_ref())
            .filter(|d| d.fires(rand::random::<f64>()));

        let mut per_call = self.config.call_timeout;
        let mut skipped = None;

        if let Some(directive) = orchestrator_fault {
            root.set_attribute("fault.orchestrator", directive.kind.as_str());
            match directive.kind {
                FaultKind::PartialFailure => {
                    if !self.agents.is_empty() {
                        let index = pick_skipped(self.agents.len());
                        root.set_attribute("fault.skipped_agent", self.agents[index].name.clone());
                        skipped = Some(index);
                    }
                }
                FaultKind::FanOutTimeout => {
                    per_call = self.config.fan_out_timeout;
                }
                FaultKind::HighLatency => {
                    let delay = directive
                        .params
                        .delay_ms
                        .map(Duration::from_millis)
                        .unwrap_or(self.config.default_delay);
                    root.set_attribute("fault.delay_ms", delay.as_millis() as u64);
                    tokio::time::sleep(delay).await;
                }
                // Rejected by validation; listed so new kinds must be placed.
                FaultKind::None
                | FaultKind::ToolTimeout
                | FaultKind::ToolError
                | FaultKind::RateLimited
                | FaultKind::TokenLimitExceeded
                | FaultKind::Hallucination
                | FaultKind::WrongTool
                | FaultKind::WrongCity
                | FaultKind::Empty => {}
            }
        }

        let collector = ErrorCollector::new();

        if let Some(index) = skipped {
            let name = &self.agents[index].name;
            info!(agent = %name, "Skipping sub-agent for partial_failure");
            collector.record(
                index,
                AgentError {
                    agent_name: name.clone(),
                    kind: ErrorKind::Skipped,
                    detail: format!("Simulated partial failure - skipping {}", name),
                },
            );
            self.record_call(name, ErrorKind::Skipped.as_str());
        }

        let calls = self
            .agents
            .iter()
            .enumerate()
            .filter(|(index, _)| Some(*index) != skipped)
            .map(|(index, slot)| {
                let directive = request.fault.as_ref().and_then(|f| f.for_agent(&slot.name));
                let client_span = Span::start(
                    root.child_context(),
                    format!("call_agent {}", slot.name),
                    SpanKind::Client,
                )
                .with_attribute("gen_ai.agent.name", slot.name.clone());
                self.call_agent(index, slot, destination, directive, per_call, client_span, &collector)
            });

        // Barrier: every call settles before the aggregate is built.
        let settled = futures::future::join_all(calls).await;

        let mut results = BTreeMap::new();
        for (name, payload, client_span) in settled {
            if let Some(payload) = payload {
                results.insert(name, payload);
            }
            root.add_child(client_span);
        }

        let errors = collector.into_ordered();
        let recommendation = self.recommendation(destination, &results, &errors);
        let response = PlanResponse::assemble(
            destination,
            results,
            errors,
            recommendation,
            root.context.trace_id.to_hex(),
        );

        root.set_attribute("partial", response.partial);
        root.set_attribute("errors_count", response.errors.len());
        if response.partial {
            root.end_error(format!(
                "Partial failure: {} sub-agent(s) failed",
                response.errors.len()
            ));
            self.record_outcome(OUTCOME_PARTIAL);
        } else {
            root.end_ok();
            self.record_outcome(OUTCOME_SUCCESS);
        }

        info!(
            trace_id = %response.trace_id,
            destination = %response.destination,
            partial = response.partial,
            errors = response.errors.len(),
            duration_ms = root.duration_ms.unwrap_or_default(),
            "Plan complete"
        );

        Ok(PlanOutcome {
            response,
            span: root,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn call_agent(
        &self,
        position: usize,
        slot: &AgentSlot,
        destination: &str,
        directive: Option<&FaultDirective>,
        per_call: Duration,
        mut span: Span,
        collector: &ErrorCollector,
    ) -> (String, Option<Value>, Span) {
        let mut request = InvokeRequest::new(task_for(&slot.name, destination))
            .with_location(destination);
        if let Some(directive) = directive {
            span.set_attribute("fault.requested", directive.kind.as_str());
            request = request.with_fault(directive.clone());
        }

        let headers = inject(&span.context);
        let outcome = timeout(per_call, slot.caller.call(request, headers)).await;

        let failure = match outcome {
            Ok(Ok(result)) if result.is_ok() && result.payload.is_some() => {
                debug!(agent = %slot.name, "Sub-agent answered");
                span.set_attribute("status", "ok");
                if let Some(tool) = &result.tool {
                    span.set_attribute("gen_ai.tool.name", tool.clone());
                }
                span.end_ok();
                self.record_call(&slot.name, "ok");
                return (slot.name.clone(), result.payload, span);
            }
            Ok(Ok(result)) if result.is_ok() => (
                ErrorKind::Transport,
                "transport: ok reply without payload".to_string(),
            ),
            Ok(Ok(result)) => answered_failure(&result),
            Ok(Err(ClientError::Timeout(_))) | Err(_) => (
                ErrorKind::Timeout,
                format!("timeout: no reply within {}ms", per_call.as_millis()),
            ),
            Ok(Err(e)) => (ErrorKind::Transport, format!("transport: {}", e)),
        };

        let (kind, detail) = failure;
        warn!(agent = %slot.name, kind = kind.as_str(), detail = %detail, "Sub-agent call failed");
        span.set_attribute("status", kind.as_str());
        span.set_attribute("error.type", kind.as_str());
        span.end_error(detail.clone());
        self.record_call(&slot.name, kind.as_str());
        collector.record(
            position,
            AgentError {
                agent_name: slot.name.clone(),
                kind,
                detail,
            },
        );

        (slot.name.clone(), None, span)
    }

    /// Summary with graceful degradation for missing agents.
    fn recommendation(
        &self,
        destination: &str,
        results: &BTreeMap<String, Value>,
        errors: &[AgentError],
    ) -> String {
        let mut parts = vec![format!("Great choice! {} looks wonderful.", destination)];
        for slot in &self.agents {
            let summary = results
                .get(&slot.name)
                .and_then(|payload| payload.get("summary"))
                .and_then(Value::as_str);
            match summary {
                Some(summary) => parts.push(summary.to_string()),
                None if errors.iter().any(|e| e.agent_name == slot.name) => {
                    parts.push(format!(
                        "{} info temporarily unavailable.",
                        capitalize(&slot.name)
                    ));
                }
                None => {}
            }
        }
        parts.join(" ")
    }

    fn record_call(&self, agent: &str, status: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_call(agent, status);
        }
    }

    fn record_outcome(&self, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_request(outcome);
        }
    }
}

fn answered_failure(result: &SubAgentResult) -> (ErrorKind, String) {
    let kind = match result.status {
        AgentStatus::Timeout => ErrorKind::Timeout,
        AgentStatus::Ok | AgentStatus::Error => ErrorKind::Error,
    };
    let class = result.error_detail.as_deref().unwrap_or(kind.as_str());
    let detail = match &result.error_message {
        Some(message) => format!("{}: {}", class, message),
        None => class.to_string(),
    };
    (kind, detail)
}

fn pick_skipped(count: usize) -> usize {
    rand::thread_rng().gen_range(0..count)
}

/// Task text sent to a sub-agent.
pub fn task_for(agent: &str, destination: &str) -> String {
    match agent {
        "weather" => format!("What's the weather in {}?", destination),
        "events" => format!("What's happening in {}?", destination),
        _ => format!("Tell me about {}", destination),
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
