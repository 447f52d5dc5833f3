//! # Ingestion
//!
//! Measurement ingestion module.
//!
//! Responsibilities:
//! - Bound in-flight fetches with a `ConcurrencyGate`
//! - Retry fetches with a fixed-count, fixed-delay policy (`retry_fetch`)
//! - Schedule one task per location x source and wait for all of them (`FetchPlan`)
//! - Concrete sources (OpenWeather, OpenAQ, Open-Meteo, Mock) and historical providers
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{ConcurrencyGate, FetchPlan, FetchPolicy, MockSource};
//! use contracts::SourceTag;
//!
//! let plan = FetchPlan::new()
//!     .lane(MockSource::new(SourceTag::Weather), FetchPolicy::for_tag(SourceTag::Weather))
//!     .lane(MockSource::new(SourceTag::AirQualityA), FetchPolicy::for_tag(SourceTag::AirQualityA));
//!
//! let gate = ConcurrencyGate::new(5);
//! let outcomes = plan.execute(&["London".to_string()], &gate).await;
//! assert_eq!(outcomes.len(), 2);
//! ```

mod error;
mod gate;
mod historical;
mod mock;
mod retry;
mod scheduler;
mod sources;

// Re-exports
pub use error::{IngestionError, Result};
pub use gate::{ConcurrencyGate, GatePermit};
pub use historical::{parse_historical_csv, CsvHistoricalProvider, EmptyHistorical, HistoricalSource};
pub use mock::{MockBehavior, MockSource};
pub use retry::{retry_fetch, FetchPolicy, RetryingSource};
pub use scheduler::{FetchPlan, FetchScheduler};
pub use sources::{
    http_client, HttpClient, OpenAqSource, OpenMeteoSource, OpenWeatherSource, DEFAULT_HTTP_TIMEOUT,
};
