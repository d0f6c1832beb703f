//! Canary configuration
//!
//! Read once at startup and never changed afterwards.

use agent_faults::FaultWeights;
use std::path::Path;
use std::time::Duration;

use crate::error::{CanaryError, Result};

pub const DEFAULT_PLANNER_URL: &str = "http://travel-planner:8000";

pub const DEFAULT_DESTINATIONS: &[&str] = &[
    "Paris", "Tokyo", "London", "Berlin", "Sydney", "New York", "Mumbai", "Seattle",
];

pub const DEFAULT_TARGETS: &[&str] = &["weather", "events"];

#[derive(Debug, Clone)]
pub struct CanaryConfig {
    pub planner_url: String,

    /// Pause between cycles
    pub interval: Duration,

    pub weights: FaultWeights,

    /// Destinations drawn uniformly each cycle
    pub destinations: Vec<String>,

    /// Sub-agents that may receive an agent-level fault
    pub targets: Vec<String>,

    /// Full counter snapshot every N cycles
    pub report_every: u64,

    pub health_attempts: u32,
    pub health_interval: Duration,

    /// Timeout for one plan request
    pub request_timeout: Duration,
}

impl Default for CanaryConfig {
    fn default() -> Self {
        Self {
            planner_url: DEFAULT_PLANNER_URL.to_string(),
            interval: Duration::from_secs(30),
            weights: FaultWeights::default(),
            destinations: DEFAULT_DESTINATIONS.iter().map(|d| d.to_string()).collect(),
            targets: DEFAULT_TARGETS.iter().map(|t| t.to_string()).collect(),
            report_every: 10,
            health_attempts: 30,
            health_interval: Duration::from_secs(2),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl CanaryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.destinations.is_empty() {
            return Err(CanaryError::invalid_config("at least one destination is required"));
        }
        if let Some(position) = self.destinations.iter().position(|d| d.trim().is_empty()) {
            return Err(CanaryError::invalid_config(format!(
                "destination {} is blank",
                position + 1
            )));
        }
        if self.targets.is_empty() {
            return Err(CanaryError::invalid_config("at least one fault target is required"));
        }
        if self.report_every == 0 {
            return Err(CanaryError::invalid_config("report_every must be positive"));
        }
        Ok(())
    }
}

/// Resolve fault weights.
///
/// A weights file wins over inline JSON; with neither the built-in
/// distribution is used. Files ending in `.yaml`/`.yml` are read as YAML,
/// anything else as JSON.
pub fn load_weights(inline_json: Option<&str>, file: Option<&Path>) -> Result<FaultWeights> {
    if let Some(path) = file {
        let content = std::fs::read_to_string(path).map_err(|e| CanaryError::FileError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        return parse_weights(&content, is_yaml(path));
    }

    match inline_json {
        Some(json) if !json.trim().is_empty() => Ok(FaultWeights::from_json(json)?),
        _ => Ok(FaultWeights::default()),
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn parse_weights(content: &str, yaml: bool) -> Result<FaultWeights> {
    if yaml {
        serde_yaml::from_str(content)
            .map_err(|e| CanaryError::invalid_config(format!("weights file: {}", e)))
    } else {
        Ok(FaultWeights::from_json(content)?)
    }
}
