//! Transform chain with per-step failure isolation

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use contracts::Table;
use tracing::{debug, error, instrument};

use crate::step::TransformStep;

/// A step the chain skipped
#[derive(Debug, Clone, PartialEq)]
pub struct StepFailure {
    pub step: String,
    pub message: String,
}

/// What happened to each step of one `apply`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainReport {
    pub applied: Vec<String>,
    pub failed: Vec<StepFailure>,
}

impl ChainReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Resolved, ordered steps
#[derive(Clone, Default)]
pub struct TransformChain {
    steps: Vec<Arc<dyn TransformStep>>,
}

impl TransformChain {
    pub fn new(steps: Vec<Arc<dyn TransformStep>>) -> Self {
        Self { steps }
    }

    pub fn names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Apply every step in order
    ///
    /// Each step runs on a copy of the current table. When it returns an error
    /// or panics, the error is logged and the table from before the step
    /// carries forward. Steps are never retried.
    #[instrument(name = "transform_chain", skip_all, fields(steps = self.steps.len(), rows = table.len()))]
    pub fn apply(&self, table: Table) -> (Table, ChainReport) {
        let mut current = table;
        let mut report = ChainReport::default();

        for step in &self.steps {
            let name = step.name().to_string();
            let input = current.clone();

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| step.apply(input)));
            let message = match outcome {
                Ok(Ok(next)) => {
                    debug!(step = %name, "transform applied");
                    current = next;
                    report.applied.push(name);
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(payload) => panic_message(payload.as_ref()),
            };

            error!(step = %name, error = %message, "transform failed, keeping previous table");
            metrics::counter!("atmos_transform_failures_total", "step" => name.clone()).increment(1);
            report.failed.push(StepFailure {
                step: name,
                message,
            });
        }

        (current, report)
    }
}

impl std::fmt::Debug for TransformChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformChain")
            .field("steps", &self.names())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}
