//! Fault directive data contract.
//!
//! A directive names one simulated failure and its parameters. On the wire a
//! directive is either a bare type string (`"partial_failure"`) or an object
//! whose parameters sit nested under `params` or flat next to `type`:
//!
//! ```json
//! {"type": "high_latency", "params": {"delay_ms": 500}}
//! {"type": "error", "probability": 0.5}
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Every failure the harness knows how to simulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    None,
    HighLatency,
    #[serde(alias = "timeout")]
    ToolTimeout,
    #[serde(alias = "error")]
    ToolError,
    #[serde(alias = "rate_limit_exceeded")]
    RateLimited,
    TokenLimitExceeded,
    Hallucination,
    WrongTool,
    WrongCity,
    Empty,
    PartialFailure,
    FanOutTimeout,
}

impl FaultKind {
    pub const ALL: [FaultKind; 12] = [
        FaultKind::None,
        FaultKind::HighLatency,
        FaultKind::ToolTimeout,
        FaultKind::ToolError,
        FaultKind::RateLimited,
        FaultKind::TokenLimitExceeded,
        FaultKind::Hallucination,
        FaultKind::WrongTool,
        FaultKind::WrongCity,
        FaultKind::Empty,
        FaultKind::PartialFailure,
        FaultKind::FanOutTimeout,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::None => "none",
            FaultKind::HighLatency => "high_latency",
            FaultKind::ToolTimeout => "tool_timeout",
            FaultKind::ToolError => "tool_error",
            FaultKind::RateLimited => "rate_limited",
            FaultKind::TokenLimitExceeded => "token_limit_exceeded",
            FaultKind::Hallucination => "hallucination",
            FaultKind::WrongTool => "wrong_tool",
            FaultKind::WrongCity => "wrong_city",
            FaultKind::Empty => "empty",
            FaultKind::PartialFailure => "partial_failure",
            FaultKind::FanOutTimeout => "fan_out_timeout",
        }
    }

    /// Types that only make sense for the fan-out as a whole.
    pub fn is_orchestrator_only(&self) -> bool {
        matches!(self, FaultKind::PartialFailure | FaultKind::FanOutTimeout)
    }

    /// Types accepted in the orchestrator-level slot of a plan request.
    pub fn is_orchestrator_level(&self) -> bool {
        matches!(
            self,
            FaultKind::None
                | FaultKind::HighLatency
                | FaultKind::PartialFailure
                | FaultKind::FanOutTimeout
        )
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FaultKind {
    type Err = DirectiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "timeout" => return Ok(FaultKind::ToolTimeout),
            "error" => return Ok(FaultKind::ToolError),
            "rate_limit_exceeded" => return Ok(FaultKind::RateLimited),
            _ => {}
        }
        FaultKind::ALL
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| DirectiveError::UnknownKind(s.to_string()))
    }
}

/// Directive validation failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DirectiveError {
    #[error("unknown fault type: {0}")]
    UnknownKind(String),

    #[error("probability must be within [0, 1], got {0}")]
    InvalidProbability(f64),

    #[error("max_chars must be greater than zero")]
    InvalidMaxChars,

    #[error("fault type '{0}' only applies to the orchestrator")]
    OrchestratorOnly(FaultKind),

    #[error("fault type '{0}' cannot be applied at the orchestrator")]
    NotOrchestratorLevel(FaultKind),
}

/// Optional knobs for a directive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaultParams {
    /// Delay for `high_latency`, stall for `tool_timeout`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,

    /// Chance the directive fires, 1.0 when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,

    /// Restrict a tool-level fault to one named tool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,

    /// Truncation limit for `token_limit_exceeded`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_chars: Option<usize>,

    /// City whose listings `wrong_city` serves instead
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrong_city: Option<String>,
}

impl FaultParams {
    pub fn is_empty(&self) -> bool {
        self == &FaultParams::default()
    }

    /// Fill unset fields from `other`.
    fn or(self, other: FaultParams) -> FaultParams {
        FaultParams {
            delay_ms: self.delay_ms.or(other.delay_ms),
            probability: self.probability.or(other.probability),
            tool: self.tool.or(other.tool),
            max_chars: self.max_chars.or(other.max_chars),
            wrong_city: self.wrong_city.or(other.wrong_city),
        }
    }
}

/// What to simulate at one hop. Immutable once a request begins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DirectiveRepr")]
pub struct FaultDirective {
    #[serde(rename = "type")]
    pub kind: FaultKind,

    #[serde(default, skip_serializing_if = "FaultParams::is_empty")]
    pub params: FaultParams,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DirectiveRepr {
    Bare(FaultKind),
    Full {
        #[serde(rename = "type")]
        kind: FaultKind,
        #[serde(default)]
        params: Option<FaultParams>,
        #[serde(flatten)]
        inline: FaultParams,
    },
}

impl TryFrom<DirectiveRepr> for FaultDirective {
    type Error = DirectiveError;

    fn try_from(repr: DirectiveRepr) -> Result<Self, Self::Error> {
        let directive = match repr {
            DirectiveRepr::Bare(kind) => FaultDirective::new(kind),
            DirectiveRepr::Full {
                kind,
                params,
                inline,
            } => FaultDirective {
                kind,
                params: params.unwrap_or_default().or(inline),
            },
        };
        directive.validate()?;
        Ok(directive)
    }
}

impl FaultDirective {
    pub fn new(kind: FaultKind) -> Self {
        Self {
            kind,
            params: FaultParams::default(),
        }
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.params.delay_ms = Some(delay_ms);
        self
    }

    pub fn with_probability(mut self, probability: f64) -> Self {
        self.params.probability = Some(probability);
        self
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.params.tool = Some(tool.into());
        self
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.params.max_chars = Some(max_chars);
        self
    }

    pub fn with_wrong_city(mut self, city: impl Into<String>) -> Self {
        self.params.wrong_city = Some(city.into());
        self
    }

    /// Parameter range checks.
    pub fn validate(&self) -> Result<(), DirectiveError> {
        if let Some(p) = self.params.probability {
            if !(0.0..=1.0).contains(&p) {
                return Err(DirectiveError::InvalidProbability(p));
            }
        }
        if self.params.max_chars == Some(0) {
            return Err(DirectiveError::InvalidMaxChars);
        }
        Ok(())
    }

    /// Check the directive may be sent to a single sub-agent.
    pub fn validate_for_agent(&self) -> Result<(), DirectiveError> {
        self.validate()?;
        if self.kind.is_orchestrator_only() {
            return Err(DirectiveError::OrchestratorOnly(self.kind));
        }
        Ok(())
    }

    /// Check the directive may sit in the orchestrator-level slot.
    pub fn validate_for_orchestrator(&self) -> Result<(), DirectiveError> {
        self.validate()?;
        if !self.kind.is_orchestrator_level() {
            return Err(DirectiveError::NotOrchestratorLevel(self.kind));
        }
        Ok(())
    }

    pub fn probability(&self) -> f64 {
        self.params.probability.unwrap_or(1.0)
    }

    /// Whether the directive fires for a uniform draw `u` in [0, 1).
    pub fn fires(&self, u: f64) -> bool {
        self.kind != FaultKind::None && u < self.probability()
    }

    /// Whether a tool-level fault applies to `tool`.
    pub fn targets_tool(&self, tool: &str) -> bool {
        self.params.tool.as_deref().map_or(true, |t| t == tool)
    }
}

impl From<FaultKind> for FaultDirective {
    fn from(kind: FaultKind) -> Self {
        FaultDirective::new(kind)
    }
}
