//! # Enrichment
//!
//! Transform registry and failure-isolated transform chain.
//!
//! Responsibilities:
//! - Name → step registry (`TransformRegistry::standard()` holds the seven standard steps)
//! - Resolve configured names up front; unknown names fail before any fetch starts
//! - Apply steps in order; a failing or panicking step is skipped and the table
//!   from before it carries forward
//!
//! ## Usage Example
//!
//! ```ignore
//! use enrichment::TransformRegistry;
//!
//! let chain = TransformRegistry::standard().resolve(&blueprint.pipeline.transforms)?;
//! let (table, report) = chain.apply(table);
//! ```

mod chain;
mod error;
mod registry;
mod step;
mod steps;

pub use chain::{ChainReport, StepFailure, TransformChain};
pub use error::{EnrichmentError, StepError};
pub use registry::TransformRegistry;
pub use step::{FnStep, TransformStep};
pub use steps::{
    AddFeelsLikeTemp, AddHumidityLevel, AddIsRainy, AddWeatherScore, CleanDescription,
    FillMissing, KelvinToCelsius,
};
