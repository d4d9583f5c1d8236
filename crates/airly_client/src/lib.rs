//! Airly measurement API client.
//!
//! Fetches the current air-quality measurement for a point from
//! `airapi.airly.eu` and parses it into `MeasurementResponse`.

use async_trait::async_trait;
use common::{Error, MeasurementResponse};
use std::error::Error as StdError;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_BASE_URL: &str = "https://airapi.airly.eu";
const MEASUREMENTS_PATH: &str = "/v2/measurements/point";

/// Anything that can produce a measurement for a coordinate pair.
#[async_trait]
pub trait MeasurementSource: Send + Sync {
    async fn fetch(&self, latitude: &str, longitude: &str) -> Result<MeasurementResponse, Error>;
}

fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

fn resolve_base_url(get: impl Fn(&str) -> Option<String>) -> String {
    if let Some(override_url) = get("AIRLY_API_BASE_URL") {
        let normalized = normalize_base_url(&override_url);
        if !normalized.is_empty() {
            info!("Using AIRLY_API_BASE_URL override: {}", normalized);
            return normalized;
        }
        warn!("Ignoring empty AIRLY_API_BASE_URL override");
    }

    DEFAULT_BASE_URL.to_string()
}

/// A zero duration means no timeout.
fn request_timeout(timeout: Duration) -> Option<Duration> {
    (!timeout.is_zero()).then_some(timeout)
}

fn format_reqwest_error(err: &reqwest::Error) -> String {
    // Keep chained causes so DNS/TLS/socket failures are visible.
    let mut message = err.to_string();
    let mut source = err.source();

    while let Some(cause) = source {
        let cause_msg = cause.to_string();
        if !cause_msg.is_empty() && !message.contains(&cause_msg) {
            message.push_str(": ");
            message.push_str(&cause_msg);
        }
        source = cause.source();
    }

    message
}

fn summarize_response_body(raw: &str) -> String {
    const MAX_CHARS: usize = 500;
    let compact = raw.replace(['\n', '\r'], " ");
    match compact.char_indices().nth(MAX_CHARS) {
        Some((cut, _)) => format!("{}…", &compact[..cut]),
        None => compact,
    }
}

/// Airly REST client.
#[derive(Debug, Clone)]
pub struct AirlyClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AirlyClient {
    /// Create a client against the production API (or `AIRLY_API_BASE_URL`).
    ///
    /// A zero `timeout` leaves requests unbounded.
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, Error> {
        Self::with_base_url(api_key, resolve_base_url(|key| std::env::var(key).ok()), timeout)
    }

    /// Create a client against an explicit base URL.
    pub fn with_base_url(
        api_key: String,
        base_url: impl AsRef<str>,
        timeout: Duration,
    ) -> Result<Self, Error> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("airly-sensor/", env!("CARGO_PKG_VERSION")))
            .pool_max_idle_per_host(2);
        if let Some(timeout) = request_timeout(timeout) {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: normalize_base_url(base_url.as_ref()),
        })
    }

    /// Fetch the current measurement for a point. Single attempt, no retry.
    pub async fn get_measurements(
        &self,
        latitude: &str,
        longitude: &str,
    ) -> Result<MeasurementResponse, Error> {
        let url = format!("{}{}", self.base_url, MEASUREMENTS_PATH);
        debug!("Fetching Airly measurements: {} lat={} lng={}", url, latitude, longitude);

        let resp = self
            .client
            .get(&url)
            .query(&[("lat", latitude), ("lng", longitude)])
            .header("apikey", &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| Error::Network(format_reqwest_error(&e)))?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::HttpStatus {
                status,
                body: summarize_response_body(&body),
            });
        }

        let body = resp
            .text()
            .await
            .map_err(|e| Error::Network(format_reqwest_error(&e)))?;
        let data: MeasurementResponse = serde_json::from_str(&body)?;

        debug!(
            "Got {} values and {} indexes for ({},{})",
            data.current.values.len(),
            data.current.indexes.len(),
            latitude,
            longitude
        );

        Ok(data)
    }
}

#[async_trait]
impl MeasurementSource for AirlyClient {
    async fn fetch(&self, latitude: &str, longitude: &str) -> Result<MeasurementResponse, Error> {
        self.get_measurements(latitude, longitude).await
    }
}
