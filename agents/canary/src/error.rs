//! Error types for the canary

use agent_faults::WeightsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CanaryError {
    /// Weights failed to parse or validate
    #[error("Invalid fault weights: {0}")]
    Weights(#[from] WeightsError),

    /// Weights file could not be read
    #[error("Failed to read {path}: {message}")]
    FileError { path: PathBuf, message: String },

    /// Anything else wrong with the configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The planner never reported healthy
    #[error("Travel planner at {url} not healthy after {attempts} attempts")]
    NotReady { url: String, attempts: u32 },
}

impl CanaryError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        CanaryError::InvalidConfig(msg.into())
    }

    /// True for errors raised before any cycle could run.
    pub fn is_config_error(&self) -> bool {
        !matches!(self, CanaryError::NotReady { .. })
    }
}

pub type Result<T> = std::result::Result<T, CanaryError>;
