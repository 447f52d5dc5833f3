//! OpenWeatherMap current-weather provider

use std::collections::HashMap;

use contracts::{
    ContractError, FetchReply, FetchSource, Measurement, MeasurementRecord, SourceTag,
    WeatherReading,
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, error};

use super::base_url;
use crate::error::{IngestionError, Result};

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

/// Environment variable holding the API key unless `api_key_env` says otherwise
pub const DEFAULT_API_KEY_ENV: &str = "WEATHER_API_KEY";

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    main: Option<MainBlock>,
    wind: Option<WindBlock>,
    #[serde(default)]
    weather: Vec<Conditions>,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: Option<f64>,
    feels_like: Option<f64>,
    humidity: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WindBlock {
    speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Conditions {
    description: Option<String>,
}

impl From<CurrentWeather> for WeatherReading {
    fn from(body: CurrentWeather) -> Self {
        let main = body.main;
        Self {
            temp_k: main.as_ref().and_then(|m| m.temp),
            humidity: main.as_ref().and_then(|m| m.humidity),
            wind_speed: body.wind.and_then(|w| w.speed),
            description: body.weather.into_iter().next().and_then(|c| c.description),
            feels_like_k: main.as_ref().and_then(|m| m.feels_like),
        }
    }
}

/// Primary weather feed
#[derive(Debug, Clone)]
pub struct OpenWeatherSource {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenWeatherSource {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    /// Build from source params (`api_key_env`, `base_url`)
    ///
    /// # Errors
    /// `MissingApiKey` when the key variable is unset or empty.
    pub fn from_params(client: Client, params: &HashMap<String, String>) -> Result<Self> {
        let var = params
            .get("api_key_env")
            .map(String::as_str)
            .unwrap_or(DEFAULT_API_KEY_ENV);
        let api_key = std::env::var(var)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| IngestionError::MissingApiKey {
                var: var.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: base_url(params, DEFAULT_BASE_URL),
            api_key,
        })
    }
}

impl FetchSource for OpenWeatherSource {
    fn tag(&self) -> SourceTag {
        SourceTag::Weather
    }

    async fn fetch(&self, location: &str) -> std::result::Result<FetchReply, ContractError> {
        debug!(location, "fetching weather");
        let raised = |e: reqwest::Error| ContractError::fetch(SourceTag::Weather, location, e.to_string());

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("q", location), ("appid", self.api_key.as_str())])
            .send()
            .await
            .map_err(raised)?;

        let status = response.status();
        if status != StatusCode::OK {
            error!(location, status = %status, "weather provider returned an error status");
            return Ok(FetchReply::Degraded(MeasurementRecord::degraded(
                SourceTag::Weather,
                location,
            )));
        }

        let body: CurrentWeather = response.json().await.map_err(raised)?;
        Ok(FetchReply::Complete(MeasurementRecord::observed_now(
            location,
            SourceTag::Weather,
            Measurement::Weather(body.into()),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_mapping() {
        let body: CurrentWeather = serde_json::from_str(
            r#"{
                "main": {"temp": 300.0, "feels_like": 302.5, "humidity": 50},
                "wind": {"speed": 3.1},
                "weather": [{"description": "light rain"}, {"description": "mist"}]
            }"#,
        )
        .unwrap();
        let reading = WeatherReading::from(body);
        assert_eq!(reading.temp_k, Some(300.0));
        assert_eq!(reading.feels_like_k, Some(302.5));
        assert_eq!(reading.humidity, Some(50.0));
        assert_eq!(reading.wind_speed, Some(3.1));
        assert_eq!(reading.description.as_deref(), Some("light rain"));
    }

    #[test]
    fn test_missing_blocks_are_absent() {
        let body: CurrentWeather = serde_json::from_str(r#"{"weather": []}"#).unwrap();
        let reading = WeatherReading::from(body);
        assert_eq!(reading, WeatherReading::default());
    }

    #[test]
    fn test_missing_api_key_is_setup_failure() {
        let mut params = HashMap::new();
        params.insert(
            "api_key_env".to_string(),
            "ATMOS_TEST_SURELY_UNSET_WEATHER_KEY".to_string(),
        );
        let client = crate::http_client(std::time::Duration::from_secs(1)).unwrap();
        let result = OpenWeatherSource::from_params(client, &params);
        assert!(matches!(result, Err(IngestionError::MissingApiKey { .. })));
    }
}
