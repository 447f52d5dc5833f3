//! HTTP measurement providers
//!
//! Every provider answers non-200 responses with a degraded reply and reports
//! transport or decode failures as errors, which the retry wrapper handles.

mod open_aq;
mod open_meteo;
mod open_weather;

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;

/// HTTP client shared by the providers of one run
pub use reqwest::Client as HttpClient;

use crate::error::{IngestionError, Result};

pub use open_aq::OpenAqSource;
pub use open_meteo::OpenMeteoSource;
pub use open_weather::OpenWeatherSource;

/// Default per-request timeout
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared HTTP client for all providers of a run
pub fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("atmos/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| IngestionError::HttpClient {
            message: e.to_string(),
        })
}

/// `base_url` param, or the provider default
fn base_url(params: &HashMap<String, String>, default: &str) -> String {
    params
        .get("base_url")
        .map(|url| url.trim_end_matches('/').to_string())
        .unwrap_or_else(|| default.to_string())
}

fn parse_param<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| IngestionError::InvalidParam {
        key: key.to_string(),
        message: e.to_string(),
    })
}
