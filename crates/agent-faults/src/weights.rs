//! Weighted fault-type sampling.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::directive::FaultKind;

/// Allowed distance of the weight sum from 1.0.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum WeightsError {
    #[error("fault weights are empty")]
    Empty,

    #[error("weight for '{kind}' must be finite and non-negative, got {weight}")]
    InvalidWeight { kind: FaultKind, weight: f64 },

    #[error("fault weights must sum to 1.0, got {0}")]
    BadSum(f64),

    #[error("failed to parse fault weights: {0}")]
    Parse(String),
}

/// Probability per fault type, summing to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<FaultKind, f64>", into = "BTreeMap<FaultKind, f64>")]
pub struct FaultWeights {
    weights: BTreeMap<FaultKind, f64>,
}

impl FaultWeights {
    pub fn new(weights: BTreeMap<FaultKind, f64>) -> Result<Self, WeightsError> {
        if weights.is_empty() {
            return Err(WeightsError::Empty);
        }
        for (kind, weight) in &weights {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(WeightsError::InvalidWeight {
                    kind: *kind,
                    weight: *weight,
                });
            }
        }
        let total: f64 = weights.values().sum();
        if (total - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(WeightsError::BadSum(total));
        }
        Ok(Self { weights })
    }

    /// Parse a JSON object such as `{"none": 0.5, "tool_error": 0.5}`.
    pub fn from_json(input: &str) -> Result<Self, WeightsError> {
        serde_json::from_str(input).map_err(|e| WeightsError::Parse(e.to_string()))
    }

    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn probability(&self, kind: FaultKind) -> f64 {
        self.weights.get(&kind).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FaultKind, f64)> + '_ {
        self.weights.iter().map(|(k, w)| (*k, *w))
    }

    /// Map a uniform value in [0, 1) onto a fault type by cumulative
    /// distribution. Types with zero weight are never returned.
    pub fn sample(&self, u: f64) -> FaultKind {
        let mut cumulative = 0.0;
        let mut last = FaultKind::None;
        for (kind, weight) in self.iter().filter(|(_, w)| *w > 0.0) {
            cumulative += weight;
            last = kind;
            if u < cumulative {
                return kind;
            }
        }
        // Rounding can leave the sum a hair under 1.0.
        last
    }

    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> FaultKind {
        self.sample(rng.gen::<f64>())
    }
}

impl Default for FaultWeights {
    fn default() -> Self {
        let weights = BTreeMap::from([
            (FaultKind::None, 0.50),
            (FaultKind::ToolError, 0.18),
            (FaultKind::RateLimited, 0.15),
            (FaultKind::HighLatency, 0.07),
            (FaultKind::PartialFailure, 0.10),
        ]);
        Self { weights }
    }
}

impl TryFrom<BTreeMap<FaultKind, f64>> for FaultWeights {
    type Error = WeightsError;

    fn try_from(weights: BTreeMap<FaultKind, f64>) -> Result<Self, Self::Error> {
        Self::new(weights)
    }
}

impl From<FaultWeights> for BTreeMap<FaultKind, f64> {
    fn from(weights: FaultWeights) -> Self {
        weights.weights
    }
}
