//! Travel Planner
//!
//! Fan-out orchestrator over the weather and events sub-agents. Every call
//! is bounded by its own timeout; failed agents are reported in `errors`
//! and the plan is returned with `partial = true` instead of failing.
//!
//! # Orchestrator faults
//! - `partial_failure`: one agent, chosen uniformly, is skipped
//! - `fan_out_timeout`: every call gets a 1ms budget
//! - `high_latency`: sleep before the fan-out

pub mod client;
pub mod engine;
pub mod handler;
pub mod telemetry;

#[path = "../contracts/mod.rs"]
pub mod contracts;

pub use contracts::*;
pub use engine::{PlanError, PlanOutcome, Planner, PlannerConfig};
