//! Unified table - Merger output, Transform Chain input/output, Sink input
//!
//! Column presence is explicit: a column exists once some stage produced it,
//! independently of whether individual cells hold a value.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Table column
///
/// Declaration order is the canonical output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Location,
    TempK,
    FeelsLikeK,
    Humidity,
    WindSpeed,
    Description,
    Aqi,
    AqiOpenMeteo,
    TempCelsius,
    FeelsLikeTemp,
    HumidityLevel,
    WeatherScore,
    IsRainy,
    Timestamp,
    Source,
}

impl Column {
    pub const ALL: [Column; 15] = [
        Column::Location,
        Column::TempK,
        Column::FeelsLikeK,
        Column::Humidity,
        Column::WindSpeed,
        Column::Description,
        Column::Aqi,
        Column::AqiOpenMeteo,
        Column::TempCelsius,
        Column::FeelsLikeTemp,
        Column::HumidityLevel,
        Column::WeatherScore,
        Column::IsRainy,
        Column::Timestamp,
        Column::Source,
    ];

    /// Columns produced by the weather lane
    pub const WEATHER: [Column; 8] = [
        Column::Location,
        Column::TempK,
        Column::FeelsLikeK,
        Column::Humidity,
        Column::WindSpeed,
        Column::Description,
        Column::Timestamp,
        Column::Source,
    ];

    /// Column order of the report layout
    pub const REPORT: [Column; 13] = [
        Column::Location,
        Column::TempCelsius,
        Column::FeelsLikeTemp,
        Column::Humidity,
        Column::HumidityLevel,
        Column::WindSpeed,
        Column::IsRainy,
        Column::WeatherScore,
        Column::Aqi,
        Column::AqiOpenMeteo,
        Column::Description,
        Column::Timestamp,
        Column::Source,
    ];

    /// Header name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Location => "city",
            Self::TempK => "temp_k",
            Self::FeelsLikeK => "feels_like",
            Self::Humidity => "humidity",
            Self::WindSpeed => "wind_speed",
            Self::Description => "description",
            Self::Aqi => "aqi",
            Self::AqiOpenMeteo => "aqi_open_meteo",
            Self::TempCelsius => "temp_celsius",
            Self::FeelsLikeTemp => "feels_like_temp",
            Self::HumidityLevel => "humidity_level",
            Self::WeatherScore => "weather_score",
            Self::IsRainy => "is_rainy",
            Self::Timestamp => "timestamp",
            Self::Source => "source",
        }
    }

    /// Look a column up by header name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|column| column.name() == name.trim())
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Humidity band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HumidityLevel {
    /// below 40 %
    Low,
    /// 40 % to 70 % inclusive
    Moderate,
    /// above 70 %
    High,
}

impl HumidityLevel {
    pub fn from_humidity(humidity: f64) -> Self {
        if humidity < 40.0 {
            Self::Low
        } else if humidity <= 70.0 {
            Self::Moderate
        } else {
            Self::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
        }
    }
}

impl fmt::Display for HumidityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HumidityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "moderate" => Ok(Self::Moderate),
            "high" => Ok(Self::High),
            other => Err(format!("unknown humidity level '{other}'")),
        }
    }
}

/// One location's reconciled observation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergedRow {
    pub location: String,
    pub temp_k: Option<f64>,
    pub feels_like_k: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub description: Option<String>,
    pub aqi: Option<f64>,
    pub aqi_open_meteo: Option<f64>,
    pub temp_celsius: Option<f64>,
    pub feels_like_temp: Option<f64>,
    pub humidity_level: Option<HumidityLevel>,
    pub weather_score: Option<u8>,
    pub is_rainy: Option<bool>,
    pub timestamp: Option<DateTime<Utc>>,
    pub source: Option<String>,
}

impl MergedRow {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            ..Default::default()
        }
    }

    /// Render one cell; `None` when the value is absent
    pub fn cell(&self, column: Column) -> Option<String> {
        match column {
            Column::Location => Some(self.location.clone()),
            Column::TempK => self.temp_k.map(|v| v.to_string()),
            Column::FeelsLikeK => self.feels_like_k.map(|v| v.to_string()),
            Column::Humidity => self.humidity.map(|v| v.to_string()),
            Column::WindSpeed => self.wind_speed.map(|v| v.to_string()),
            Column::Description => self.description.clone(),
            Column::Aqi => self.aqi.map(|v| v.to_string()),
            Column::AqiOpenMeteo => self.aqi_open_meteo.map(|v| v.to_string()),
            Column::TempCelsius => self.temp_celsius.map(|v| v.to_string()),
            Column::FeelsLikeTemp => self.feels_like_temp.map(|v| v.to_string()),
            Column::HumidityLevel => self.humidity_level.map(|v| v.to_string()),
            Column::WeatherScore => self.weather_score.map(|v| v.to_string()),
            Column::IsRainy => self.is_rainy.map(|v| v.to_string()),
            Column::Timestamp => self
                .timestamp
                .map(|ts| ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Column::Source => self.source.clone(),
        }
    }

    /// Parse one cell from text
    ///
    /// Empty, `NA`, `NaN` and unparsable values leave the cell absent.
    pub fn set_cell(&mut self, column: Column, text: &str) {
        let text = text.trim();
        let value = if is_absent_marker(text) {
            None
        } else {
            Some(text)
        };

        match column {
            Column::Location => self.location = text.to_string(),
            Column::TempK => self.temp_k = value.and_then(parse_number),
            Column::FeelsLikeK => self.feels_like_k = value.and_then(parse_number),
            Column::Humidity => self.humidity = value.and_then(parse_number),
            Column::WindSpeed => self.wind_speed = value.and_then(parse_number),
            Column::Description => self.description = value.map(str::to_string),
            Column::Aqi => self.aqi = value.and_then(parse_number),
            Column::AqiOpenMeteo => self.aqi_open_meteo = value.and_then(parse_number),
            Column::TempCelsius => self.temp_celsius = value.and_then(parse_number),
            Column::FeelsLikeTemp => self.feels_like_temp = value.and_then(parse_number),
            Column::HumidityLevel => self.humidity_level = value.and_then(|v| v.parse().ok()),
            Column::WeatherScore => {
                self.weather_score = value
                    .and_then(parse_number)
                    .filter(|v| (0.0..=10.0).contains(v))
                    .map(|v| v.round() as u8)
            }
            Column::IsRainy => {
                self.is_rainy = value.and_then(|v| match v.to_ascii_lowercase().as_str() {
                    "true" => Some(true),
                    "false" => Some(false),
                    _ => None,
                })
            }
            Column::Timestamp => self.timestamp = value.and_then(parse_timestamp),
            Column::Source => self.source = value.map(str::to_string),
        }
    }

    /// Calendar day of the observation (UTC)
    pub fn date(&self) -> Option<NaiveDate> {
        self.timestamp.map(|ts| ts.date_naive())
    }
}

fn is_absent_marker(text: &str) -> bool {
    matches!(text, "" | "NA" | "N/A" | "NaN" | "nan" | "None" | "null")
}

fn parse_number(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse RFC 3339 or naive ISO-8601 timestamps (naive values are taken as UTC)
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Unified table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: BTreeSet<Column>,
    rows: Vec<MergedRow>,
}

impl Table {
    /// Table with no columns and no rows
    pub fn empty() -> Self {
        Self::default()
    }

    /// Table with the given columns and no rows
    pub fn with_columns(columns: impl IntoIterator<Item = Column>) -> Self {
        Self {
            columns: columns.into_iter().collect(),
            rows: Vec::new(),
        }
    }

    /// Present columns in canonical order
    pub fn columns(&self) -> impl Iterator<Item = Column> + '_ {
        self.columns.iter().copied()
    }

    pub fn has_column(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    pub fn add_column(&mut self, column: Column) {
        self.columns.insert(column);
    }

    pub fn rows(&self) -> &[MergedRow] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [MergedRow] {
        &mut self.rows
    }

    pub fn into_rows(self) -> Vec<MergedRow> {
        self.rows
    }

    pub fn push(&mut self, row: MergedRow) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Straight union: columns merged, rows appended in order
    pub fn append(&mut self, other: Table) {
        self.columns.extend(other.columns);
        self.rows.extend(other.rows);
    }

    /// Stable sort by (location, timestamp) ascending; absent timestamps last
    pub fn sort_by_location_and_time(&mut self) {
        self.rows.sort_by(|a, b| {
            a.location
                .cmp(&b.location)
                .then_with(|| compare_timestamps(a.timestamp, b.timestamp))
        });
    }

    /// Present columns in report layout order
    pub fn report_projection(&self) -> Vec<Column> {
        Column::REPORT
            .iter()
            .copied()
            .filter(|column| self.has_column(*column))
            .collect()
    }
}

fn compare_timestamps(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
