//! Measurement records - Fetch Source output
//!
//! One record per (source, location) fetch. Records are immutable once produced
//! and only live until the merge.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which feed a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    /// Primary weather feed
    Weather,
    /// Air-quality feed keyed by location
    AirQualityA,
    /// Air-quality feed reported at daily granularity
    AirQualityB,
    /// Pre-existing historical records
    Historical,
}

impl SourceTag {
    /// Stable lane identifier (used in config, logs and metrics labels)
    pub fn lane_name(&self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::AirQualityA => "air_quality_a",
            Self::AirQualityB => "air_quality_b",
            Self::Historical => "historical",
        }
    }

    /// Label written into the `source` column of merged rows
    pub fn provenance(&self) -> &'static str {
        match self {
            Self::Weather => "api",
            Self::AirQualityA => "openaq",
            Self::AirQualityB => "open-meteo",
            Self::Historical => "csv",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.lane_name())
    }
}

/// Weather feed fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    /// Temperature (Kelvin)
    pub temp_k: Option<f64>,
    /// Relative humidity (%)
    pub humidity: Option<f64>,
    /// Wind speed (m/s)
    pub wind_speed: Option<f64>,
    /// Free-text conditions
    pub description: Option<String>,
    /// Provider-computed apparent temperature (Kelvin)
    pub feels_like_k: Option<f64>,
}

/// Air-quality feed fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AirQualityReading {
    /// Pollutant index (particulate concentration)
    pub index: Option<f64>,
}

/// Source-specific payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Measurement {
    Weather(WeatherReading),
    AirQuality(AirQualityReading),
}

/// One fetch result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    /// Location key
    pub location: String,

    /// Producing feed
    pub source: SourceTag,

    /// Observation time (absent when the fetch degraded)
    pub timestamp: Option<DateTime<Utc>>,

    /// Feed payload
    pub measurement: Measurement,
}

impl MeasurementRecord {
    /// Create a record observed now
    pub fn observed_now(
        location: impl Into<String>,
        source: SourceTag,
        measurement: Measurement,
    ) -> Self {
        Self {
            location: location.into(),
            source,
            timestamp: Some(Utc::now()),
            measurement,
        }
    }

    /// Same shape as a success, every field absent, no timestamp
    pub fn degraded(source: SourceTag, location: impl Into<String>) -> Self {
        let measurement = match source {
            SourceTag::Weather | SourceTag::Historical => {
                Measurement::Weather(WeatherReading::default())
            }
            SourceTag::AirQualityA | SourceTag::AirQualityB => {
                Measurement::AirQuality(AirQualityReading::default())
            }
        };
        Self {
            location: location.into(),
            source,
            timestamp: None,
            measurement,
        }
    }

    /// Weather payload, if this is a weather-shaped record
    pub fn weather(&self) -> Option<&WeatherReading> {
        match &self.measurement {
            Measurement::Weather(reading) => Some(reading),
            Measurement::AirQuality(_) => None,
        }
    }

    /// Pollutant index, if this is an air-quality record carrying one
    pub fn air_quality_index(&self) -> Option<f64> {
        match &self.measurement {
            Measurement::AirQuality(reading) => reading.index,
            Measurement::Weather(_) => None,
        }
    }
}

/// Reply of a reachable source call
#[derive(Debug, Clone, PartialEq)]
pub enum FetchReply {
    /// Full response
    Complete(MeasurementRecord),
    /// Reachable but unsuccessful response (fields absent)
    Degraded(MeasurementRecord),
}

impl FetchReply {
    pub fn record(&self) -> &MeasurementRecord {
        match self {
            Self::Complete(record) | Self::Degraded(record) => record,
        }
    }
}

/// Settled fetch, as collected at the barrier
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success(MeasurementRecord),
    Degraded(MeasurementRecord),
    /// Dropped from the merge entirely
    Excluded {
        source: SourceTag,
        location: String,
        reason: String,
    },
}

impl FetchOutcome {
    pub fn source(&self) -> SourceTag {
        match self {
            Self::Success(record) | Self::Degraded(record) => record.source,
            Self::Excluded { source, .. } => *source,
        }
    }

    pub fn location(&self) -> &str {
        match self {
            Self::Success(record) | Self::Degraded(record) => &record.location,
            Self::Excluded { location, .. } => location,
        }
    }

    /// Short label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Degraded(_) => "degraded",
            Self::Excluded { .. } => "excluded",
        }
    }
}

impl From<FetchReply> for FetchOutcome {
    fn from(reply: FetchReply) -> Self {
        match reply {
            FetchReply::Complete(record) => Self::Success(record),
            FetchReply::Degraded(record) => Self::Degraded(record),
        }
    }
}
