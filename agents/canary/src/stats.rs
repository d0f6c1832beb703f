//! Cycle counters.
//!
//! Owned by the run loop; readers get copies through a `watch` channel.

use agent_faults::FaultKind;
use serde::Serialize;
use std::collections::BTreeMap;

/// How one plan call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    /// 200 with `partial = false`
    Success,
    /// 200 with `partial = true`
    Partial,
    /// Non-200 reply or no reply
    Error,
}

impl CycleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleOutcome::Success => "success",
            CycleOutcome::Partial => "partial",
            CycleOutcome::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CanaryStats {
    pub cycles: u64,
    pub successes: u64,
    pub partials: u64,
    pub errors: u64,

    /// Cycles per drawn fault type
    pub by_fault: BTreeMap<FaultKind, u64>,
}

impl CanaryStats {
    pub fn record(&mut self, fault: FaultKind, outcome: CycleOutcome) {
        self.cycles += 1;
        match outcome {
            CycleOutcome::Success => self.successes += 1,
            CycleOutcome::Partial => self.partials += 1,
            CycleOutcome::Error => self.errors += 1,
        }
        *self.by_fault.entry(fault).or_default() += 1;
    }

    /// Share of cycles the planner answered with a plan, partial or not.
    pub fn success_rate(&self) -> f64 {
        if self.cycles == 0 {
            return 0.0;
        }
        (self.successes + self.partials) as f64 / self.cycles as f64
    }
}
