/// OpenWeatherMap Air Pollution API Client
///
/// Retrieves the current air pollution observation for the configured
/// coordinate and flattens it into one `Reading` of the reading store.
///
/// API Documentation: https://openweathermap.org/api/air-pollution

use chrono::DateTime;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::config::{ApiConfig, Config, LocationConfig};
use crate::model::{FEATURES, FEATURE_COUNT, PipelineError, Reading};
use crate::store::ReadingStore;

/// Timestamp layout written for live rows (UTC, no offset suffix).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

// ============================================================================
// API Response Structures
// ============================================================================

/// Top-level response. `list` is optional so a missing field is reported
/// as a malformed response rather than a generic parse error.
#[derive(Debug, Deserialize)]
pub struct AirPollutionResponse {
    pub list: Option<Vec<AirPollutionEntry>>,
}

/// A single observation
#[derive(Debug, Deserialize)]
pub struct AirPollutionEntry {
    pub dt: i64,  // Unix epoch seconds, UTC
    pub main: AirQualityIndex,
    /// Pollutant name → concentration (μg/m³)
    pub components: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
pub struct AirQualityIndex {
    pub aqi: f64,
}

// ============================================================================
// API Client Functions
// ============================================================================

/// Builds the blocking HTTP client used by the ingest stage.
pub fn build_client(api: &ApiConfig) -> Result<reqwest::blocking::Client, PipelineError> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(api.timeout_secs))
        .build()?)
}

pub fn build_url(base_url: &str, latitude: f64, longitude: f64, api_key: &str) -> String {
    format!("{}?lat={}&lon={}&appid={}", base_url, latitude, longitude, api_key)
}

/// Reads the API key from `var`; an unset or blank variable is a
/// configuration error.
pub fn api_key_from_env(var: &str) -> Result<String, PipelineError> {
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(PipelineError::MissingCredential(var.to_string())),
    }
}

/// Fetch the current observation for a location
///
/// # Returns
/// The first (most recent) entry of the response `list`.
pub fn fetch_current(
    client: &reqwest::blocking::Client,
    api: &ApiConfig,
    location: &LocationConfig,
    api_key: &str,
) -> Result<AirPollutionEntry, PipelineError> {
    let url = build_url(&api.base_url, location.latitude, location.longitude, api_key);

    let response = client
        .get(&url)
        .header("Accept", "application/json")
        .send()?;

    if !response.status().is_success() {
        return Err(PipelineError::HttpError(response.status().as_u16()));
    }

    let body = response.text()?;
    parse_response(&body)
}

/// Parse a response body and take its first entry
pub fn parse_response(body: &str) -> Result<AirPollutionEntry, PipelineError> {
    let response: AirPollutionResponse =
        serde_json::from_str(body).map_err(|e| PipelineError::ParseError(e.to_string()))?;

    let list = response
        .list
        .ok_or_else(|| PipelineError::MalformedResponse("missing 'list' field".to_string()))?;

    list.into_iter()
        .next()
        .ok_or_else(|| PipelineError::MalformedResponse("'list' is empty".to_string()))
}

/// Flatten an observation into the canonical reading schema
///
/// Components outside the eight canonical pollutants are dropped; a
/// canonical pollutant absent from the payload is left missing.
pub fn to_reading(entry: &AirPollutionEntry) -> Result<Reading, PipelineError> {
    let timestamp = DateTime::from_timestamp(entry.dt, 0)
        .ok_or_else(|| PipelineError::ParseError(format!("epoch seconds {} out of range", entry.dt)))?
        .format(TIMESTAMP_FORMAT)
        .to_string();

    let mut features = [None; FEATURE_COUNT];
    for (slot, name) in features.iter_mut().zip(FEATURES) {
        *slot = entry.components.get(name).copied();
    }

    Ok(Reading::new(timestamp, Some(entry.main.aqi), features))
}

// ============================================================================
// Recorder
// ============================================================================

/// Fetch one observation and append it to the reading store
///
/// Nothing is appended unless every step before the write succeeds.
pub fn record_current(
    config: &Config,
    client: &reqwest::blocking::Client,
) -> Result<Reading, PipelineError> {
    let api_key = api_key_from_env(&config.api.api_key_env)?;
    record_with_key(config, client, &api_key)
}

/// Same as `record_current` with the API key already resolved.
pub fn record_with_key(
    config: &Config,
    client: &reqwest::blocking::Client,
    api_key: &str,
) -> Result<Reading, PipelineError> {
    let entry = fetch_current(client, &config.api, &config.location, api_key)?;
    record_entry(&ReadingStore::new(&config.paths.store), &entry)
}

/// Flatten and append an already fetched observation.
pub fn record_entry(store: &ReadingStore, entry: &AirPollutionEntry) -> Result<Reading, PipelineError> {
    let reading = to_reading(entry)?;
    store.append(&reading)?;
    Ok(reading)
}

// ============================================================================
// Tests
// ============================================================================
