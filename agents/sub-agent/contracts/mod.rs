//! Sub-Agent Contracts
//!
//! Wire types for a single-hop agent invocation.

use agent_faults::{FaultDirective, FaultKind, FinishReason};
use agent_trace::Span;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Input for one agent invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeRequest {
    /// Natural-language task
    pub message: String,

    /// Fault to simulate on this hop
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<FaultDirective>,

    /// Explicit location; parsed from the message when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Conversation correlation id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

impl InvokeRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fault: None,
            location: None,
            conversation_id: None,
        }
    }

    pub fn with_fault(mut self, fault: FaultDirective) -> Self {
        self.fault = Some(fault);
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Settled state of one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Ok,
    Error,
    Timeout,
}

/// Result of one invocation, as returned on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubAgentResult {
    /// Agent that produced the result
    pub agent_name: String,

    pub status: AgentStatus,

    /// Structured output, present when `status` is ok
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,

    /// Fault classification when `status` is not ok
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,

    /// Human-readable failure message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Tool chosen by intent classification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classified_tool: Option<String>,

    /// Tool actually executed, absent when none ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,

    /// Fault that fired on this hop
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault_injected: Option<FaultKind>,

    /// Closed invocation span tree; absent when the hop never answered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl SubAgentResult {
    pub fn is_ok(&self) -> bool {
        self.status == AgentStatus::Ok
    }

    /// Result for a call that never produced an answer.
    pub fn unanswered(
        agent_name: impl Into<String>,
        status: AgentStatus,
        detail: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            status,
            payload: None,
            error_detail: Some(detail.into()),
            error_message: Some(message.into()),
            classified_tool: None,
            tool: None,
            finish_reason: None,
            fault_injected: None,
            span: None,
        }
    }

    /// Trace id of the invocation span, if any
    pub fn trace_id(&self) -> Option<String> {
        self.span.as_ref().map(|s| s.context.trace_id.to_hex())
    }
}

/// Health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub agent_id: String,
    pub agent_name: String,
    pub tools: Vec<String>,
}

/// API error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub message: String,
    pub request_id: Option<Uuid>,
}
