//! Travel Planner Contracts
//!
//! Wire types for the `plan` operation.

use agent_faults::FaultDirective;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Input for a plan request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanRequest {
    pub destination: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<PlanFaults>,
}

impl PlanRequest {
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            fault: None,
        }
    }

    /// Attach a directive for one sub-agent
    pub fn with_agent_fault(mut self, agent: impl Into<String>, directive: FaultDirective) -> Self {
        self.fault
            .get_or_insert_with(PlanFaults::default)
            .agents
            .insert(agent.into(), Some(directive));
        self
    }

    /// Attach the orchestrator-level directive
    pub fn with_orchestrator_fault(mut self, directive: FaultDirective) -> Self {
        self.fault.get_or_insert_with(PlanFaults::default).orchestrator = Some(directive);
        self
    }
}

/// Fault directives for one request: at most one per sub-agent plus an
/// optional orchestrator-level directive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanFaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestrator: Option<FaultDirective>,

    /// Keyed by sub-agent name; `null` entries are ignored
    #[serde(flatten)]
    pub agents: BTreeMap<String, Option<FaultDirective>>,
}

impl PlanFaults {
    pub fn for_agent(&self, agent: &str) -> Option<&FaultDirective> {
        self.agents.get(agent).and_then(Option::as_ref)
    }

    pub fn agent_directives(&self) -> impl Iterator<Item = (&str, &FaultDirective)> {
        self.agents
            .iter()
            .filter_map(|(name, d)| d.as_ref().map(|d| (name.as_str(), d)))
    }
}

/// Why a sub-agent contributed no result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The agent answered with a failure
    Error,
    /// No answer within the per-call timeout
    Timeout,
    /// Not called because of `partial_failure`
    Skipped,
    /// Network or protocol failure
    Transport,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Error => "error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Skipped => "skipped",
            ErrorKind::Transport => "transport",
        }
    }
}

/// One failed sub-agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentError {
    pub agent_name: String,
    pub kind: ErrorKind,
    pub detail: String,
}

/// Aggregate reply of a plan request.
///
/// `partial` is true exactly when `errors` is non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanResponse {
    pub destination: String,

    /// Payload per sub-agent that answered OK
    pub results: BTreeMap<String, serde_json::Value>,

    pub partial: bool,

    /// Failures in configured agent order
    pub errors: Vec<AgentError>,

    pub recommendation: String,

    /// Trace id of the request, 32 hex chars
    pub trace_id: String,
}

impl PlanResponse {
    pub fn assemble(
        destination: impl Into<String>,
        results: BTreeMap<String, serde_json::Value>,
        errors: Vec<AgentError>,
        recommendation: String,
        trace_id: String,
    ) -> Self {
        Self {
            destination: destination.into(),
            results,
            partial: !errors.is_empty(),
            errors,
            recommendation,
            trace_id,
        }
    }

    pub fn error_for(&self, agent: &str) -> Option<&AgentError> {
        self.errors.iter().find(|e| e.agent_name == agent)
    }
}

/// Health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub agent_id: String,
    pub agent_name: String,
    pub sub_agents: Vec<String>,
}

/// API error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub message: String,
    pub request_id: Option<Uuid>,
}
