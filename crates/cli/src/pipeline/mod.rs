//! Pipeline construction and orchestration module.

mod builder;
mod orchestrator;
mod stats;

pub use builder::PipelineBuilder;
pub use orchestrator::Pipeline;
pub use stats::{PipelineStats, StageTimings};
