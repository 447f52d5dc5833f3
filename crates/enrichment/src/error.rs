//! Enrichment errors

use contracts::Column;
use thiserror::Error;

/// Failure of a single step; contained by the chain
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StepError {
    #[error("step '{step}' requires column '{column}'")]
    MissingColumn { step: String, column: Column },

    #[error("step '{step}' failed: {message}")]
    Failed { step: String, message: String },
}

impl StepError {
    pub fn failed(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            step: step.into(),
            message: message.into(),
        }
    }
}

/// Chain configuration error (raised before the run starts)
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EnrichmentError {
    #[error("unknown transform '{name}' (available: {})", available.join(", "))]
    UnknownStep {
        name: String,
        available: Vec<String>,
    },
}
