//! Open-Meteo air-quality provider (air-quality lane B)
//!
//! Keyed by coordinates; reports hourly values, the last one is taken.

use std::collections::HashMap;

use contracts::{
    AirQualityReading, ContractError, FetchReply, FetchSource, Measurement, MeasurementRecord,
    SourceTag,
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, error};

use super::{base_url, parse_param};
use crate::error::Result;

const DEFAULT_BASE_URL: &str = "https://air-quality-api.open-meteo.com/v1/air-quality";

/// Coordinates of the default locations
const KNOWN_COORDINATES: [(&str, f64, f64); 20] = [
    ("London", 51.5074, -0.1278),
    ("New York", 40.7128, -74.0060),
    ("Mumbai", 19.0760, 72.8777),
    ("Tokyo", 35.6895, 139.6917),
    ("Toronto", 43.651070, -79.347015),
    ("Sydney", -33.8688, 151.2093),
    ("Paris", 48.8566, 2.3522),
    ("Beijing", 39.9042, 116.4074),
    ("Moscow", 55.7558, 37.6173),
    ("Los Angeles", 34.0522, -118.2437),
    ("Chicago", 41.8781, -87.6298),
    ("Singapore", 1.3521, 103.8198),
    ("Dubai", 25.2048, 55.2708),
    ("Johannesburg", -26.2041, 28.0473),
    ("São Paulo", -23.5505, -46.6333),
    ("Mexico City", 19.4326, -99.1332),
    ("Istanbul", 41.0082, 28.9784),
    ("Seoul", 37.5665, 126.9780),
    ("Berlin", 52.5200, 13.4050),
    ("Hong Kong", 22.3193, 114.1694),
];

#[derive(Debug, Deserialize)]
struct AirQualityResponse {
    hourly: Option<HourlyBlock>,
}

#[derive(Debug, Deserialize)]
struct HourlyBlock {
    #[serde(default)]
    pm2_5: Vec<Option<f64>>,
}

impl AirQualityResponse {
    fn latest_pm2_5(&self) -> Option<f64> {
        self.hourly.as_ref()?.pm2_5.last().copied().flatten()
    }
}

#[derive(Debug, Clone)]
pub struct OpenMeteoSource {
    client: Client,
    base_url: String,
    coordinates: HashMap<String, (f64, f64)>,
}

impl OpenMeteoSource {
    /// Source knowing the built-in coordinate table
    pub fn new(client: Client) -> Self {
        let coordinates = KNOWN_COORDINATES
            .iter()
            .map(|(name, lat, lon)| (name.to_string(), (*lat, *lon)))
            .collect();
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            coordinates,
        }
    }

    /// Built-in table extended by `lat.<location>` / `lon.<location>` params
    ///
    /// # Errors
    /// `InvalidParam` for a non-numeric coordinate or a half-specified pair.
    pub fn from_params(client: Client, params: &HashMap<String, String>) -> Result<Self> {
        let mut source = Self::new(client);
        source.base_url = base_url(params, DEFAULT_BASE_URL);

        for (key, value) in params {
            let Some(location) = key.strip_prefix("lat.") else {
                continue;
            };
            let lat: f64 = parse_param(key, value)?;
            let lon_key = format!("lon.{location}");
            let lon_value = params.get(&lon_key).ok_or_else(|| {
                crate::IngestionError::InvalidParam {
                    key: lon_key.clone(),
                    message: format!("latitude given for '{location}' without longitude"),
                }
            })?;
            let lon: f64 = parse_param(&lon_key, lon_value)?;
            source.coordinates.insert(location.to_string(), (lat, lon));
        }

        Ok(source)
    }

    pub fn coordinates(&self, location: &str) -> Option<(f64, f64)> {
        self.coordinates.get(location).copied()
    }
}

impl FetchSource for OpenMeteoSource {
    fn tag(&self) -> SourceTag {
        SourceTag::AirQualityB
    }

    async fn fetch(&self, location: &str) -> std::result::Result<FetchReply, ContractError> {
        let Some((lat, lon)) = self.coordinates(location) else {
            error!(location, "no coordinates known for location");
            return Ok(FetchReply::Degraded(MeasurementRecord::degraded(
                SourceTag::AirQualityB,
                location,
            )));
        };

        debug!(location, lat, lon, "fetching air quality from Open-Meteo");
        let raised =
            |e: reqwest::Error| ContractError::fetch(SourceTag::AirQualityB, location, e.to_string());

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                ("hourly", "pm2_5".to_string()),
            ])
            .send()
            .await
            .map_err(raised)?;

        let status = response.status();
        if status != StatusCode::OK {
            error!(location, status = %status, "Open-Meteo returned an error status");
            return Ok(FetchReply::Degraded(MeasurementRecord::degraded(
                SourceTag::AirQualityB,
                location,
            )));
        }

        let body: AirQualityResponse = response.json().await.map_err(raised)?;
        Ok(FetchReply::Complete(MeasurementRecord::observed_now(
            location,
            SourceTag::AirQualityB,
            Measurement::AirQuality(AirQualityReading {
                index: body.latest_pm2_5(),
            }),
        )))
    }
}
