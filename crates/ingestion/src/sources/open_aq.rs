//! OpenAQ latest-measurements provider (air-quality lane A)

use std::collections::HashMap;

use contracts::{
    AirQualityReading, ContractError, FetchReply, FetchSource, Measurement, MeasurementRecord,
    SourceTag,
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, error};

use super::base_url;

const DEFAULT_BASE_URL: &str = "https://api.openaq.org/v2/latest";

/// Parameters accepted as the quality index, in priority order of appearance
const INDEX_PARAMETERS: [&str; 2] = ["pm25", "pm10"];

#[derive(Debug, Deserialize)]
struct LatestResponse {
    #[serde(default)]
    results: Vec<LatestResult>,
}

#[derive(Debug, Deserialize)]
struct LatestResult {
    #[serde(default)]
    measurements: Vec<LatestMeasurement>,
}

#[derive(Debug, Deserialize)]
struct LatestMeasurement {
    parameter: String,
    value: Option<f64>,
}

impl LatestResponse {
    /// First pm25/pm10 value of the first result
    fn index(&self) -> Option<f64> {
        self.results
            .first()?
            .measurements
            .iter()
            .find(|m| INDEX_PARAMETERS.contains(&m.parameter.as_str()))
            .and_then(|m| m.value)
    }
}

#[derive(Debug, Clone)]
pub struct OpenAqSource {
    client: Client,
    base_url: String,
}

impl OpenAqSource {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn from_params(client: Client, params: &HashMap<String, String>) -> Self {
        Self {
            client,
            base_url: base_url(params, DEFAULT_BASE_URL),
        }
    }
}

impl FetchSource for OpenAqSource {
    fn tag(&self) -> SourceTag {
        SourceTag::AirQualityA
    }

    async fn fetch(&self, location: &str) -> Result<FetchReply, ContractError> {
        debug!(location, "fetching air quality from OpenAQ");
        let raised =
            |e: reqwest::Error| ContractError::fetch(SourceTag::AirQualityA, location, e.to_string());

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("city", location)])
            .send()
            .await
            .map_err(raised)?;

        let status = response.status();
        if status != StatusCode::OK {
            error!(location, status = %status, "OpenAQ returned an error status");
            return Ok(FetchReply::Degraded(MeasurementRecord::degraded(
                SourceTag::AirQualityA,
                location,
            )));
        }

        let body: LatestResponse = response.json().await.map_err(raised)?;
        Ok(FetchReply::Complete(MeasurementRecord::observed_now(
            location,
            SourceTag::AirQualityA,
            Measurement::AirQuality(AirQualityReading {
                index: body.index(),
            }),
        )))
    }
}
