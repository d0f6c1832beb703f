//! Sub-Agent Service
//!
//! A single-hop agent: receives a task, optionally applies a fault
//! directive, invokes zero or one tool and returns a typed result together
//! with its closed span tree.
//!
//! # Profiles
//! - `weather`: get_current_weather, get_forecast, get_historical_weather
//! - `events`: fetch_events, fetch_venues
//!
//! # Status Mapping
//! - ok: 200
//! - tool_timeout: 504
//! - tool_error: 502
//! - rate_limited: 429
//! - validation failure: 400

pub mod client;
pub mod engine;
pub mod handler;
pub mod profiles;

// Re-export contracts
#[path = "../contracts/mod.rs"]
pub mod contracts;

pub use contracts::*;
pub use profiles::Profile;
