//! Agent profiles
//!
//! One binary serves either agent; the profile decides the tool set, the
//! intent rule and the wrong-tool rotation.

pub mod events;
pub mod weather;

use agent_faults::{ToolCall, Toolbox};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    Weather,
    Events,
}

impl Profile {
    /// Name the orchestrator knows this agent by.
    pub fn agent_name(&self) -> &'static str {
        match self {
            Profile::Weather => "weather",
            Profile::Events => "events",
        }
    }

    pub fn agent_id(&self) -> &'static str {
        match self {
            Profile::Weather => "weather-agent-001",
            Profile::Events => "events-agent-001",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Profile::Weather => "Weather Agent",
            Profile::Events => "Events Agent",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Profile::Weather => 8000,
            Profile::Events => 8002,
        }
    }

    pub fn tools(&self) -> &'static [&'static str] {
        match self {
            Profile::Weather => &weather::TOOLS,
            Profile::Events => &events::TOOLS,
        }
    }

    /// Run a tool. `None` when the tool does not belong to this profile.
    pub fn execute(&self, call: &ToolCall) -> Option<Value> {
        match self {
            Profile::Weather => weather::execute(call),
            Profile::Events => events::execute(call),
        }
    }
}

impl Toolbox for Profile {
    fn classify(&self, task: &str, location: &str) -> ToolCall {
        let words = words(task);
        match self {
            Profile::Weather => weather::classify(&words, location),
            Profile::Events => events::classify(&words, location),
        }
    }

    fn alternate(&self, call: &ToolCall) -> ToolCall {
        match self {
            Profile::Weather => weather::alternate(call),
            Profile::Events => events::alternate(call),
        }
    }

    fn fabricate(&self, location: &str) -> Value {
        match self {
            Profile::Weather => weather::fabricate(location),
            Profile::Events => events::fabricate(location),
        }
    }

    // Forecasts have no foreign or empty listing, so weather leaves both alone.
    fn relocate(&self, call: &ToolCall, city: Option<&str>) -> Option<ToolCall> {
        match self {
            Profile::Weather => None,
            Profile::Events => events::relocate(call, city),
        }
    }

    fn hollow(&self, payload: &Value) -> Option<Value> {
        match self {
            Profile::Weather => None,
            Profile::Events => events::hollow(payload),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.agent_name())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown profile '{0}', expected 'weather' or 'events'")]
pub struct UnknownProfile(String);

impl FromStr for Profile {
    type Err = UnknownProfile;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weather" | "weather-agent" => Ok(Profile::Weather),
            "events" | "events-agent" => Ok(Profile::Events),
            _ => Err(UnknownProfile(s.to_string())),
        }
    }
}

/// Lowercased alphanumeric words of `text`.
pub fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Location named by a task: text after the last " in ", else the last
/// word, with trailing punctuation stripped.
pub fn extract_location(task: &str) -> String {
    let trimmed = task.trim();
    let candidate = match trimmed.rfind(" in ") {
        Some(idx) => &trimmed[idx + 4..],
        None => trimmed.split_whitespace().last().unwrap_or(""),
    };
    let location = candidate
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_punctuation());
    if location.is_empty() {
        "Unknown".to_string()
    } else {
        location.to_string()
    }
}
