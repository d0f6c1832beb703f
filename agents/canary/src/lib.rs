//! Canary
//!
//! Drives the travel planner on a fixed interval. Each cycle picks a
//! destination, draws a fault type from the configured weights, sends one
//! plan request and records whether the planner answered fully, partially
//! or not at all.

pub mod config;
pub mod error;
pub mod runner;
pub mod stats;

pub use config::{load_weights, CanaryConfig};
pub use error::{CanaryError, Result};
pub use runner::{plan_request, sample_histogram, target_for, Canary, CycleReport, Draw, FaultTarget};
pub use stats::{CanaryStats, CycleOutcome};
