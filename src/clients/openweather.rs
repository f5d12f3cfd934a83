use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::models::{CityQuery, ForecastData, ForecastEntry, NewWeatherRecord};

/// Failure of a single provider call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Upstream answered with a non-2xx status.
    #[error("{message} (status {status})")]
    Status { status: u16, message: String },

    /// Timeout, DNS, connection or body read failure.
    #[error("Provider unreachable: {0}")]
    Transport(String),

    /// Response body was not JSON or lacked a required field.
    #[error("Malformed provider response: missing or invalid '{field}'")]
    Parse { field: String },
}

impl ProviderError {
    /// Transport failures, 5xx and 429 may succeed on a second attempt.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Parse { .. } => false,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn fetch_current(&self, query: &CityQuery) -> Result<NewWeatherRecord, ProviderError>;

    async fn fetch_forecast(&self, query: &CityQuery) -> Result<ForecastData, ProviderError>;
}

/// OpenWeatherMap-compatible client. Issues exactly one GET per call and
/// never retries on its own.
#[derive(Clone)]
pub struct OpenWeatherClient {
    client: Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl OpenWeatherClient {
    #[must_use]
    pub fn new(config: &ProviderConfig, client: Client) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }

    fn endpoint_url(&self, endpoint: &str, query: &CityQuery) -> Result<url::Url, ProviderError> {
        let q = match query.country.as_deref().filter(|c| !c.is_empty()) {
            Some(country) => format!("{},{}", query.city, country),
            None => query.city.clone(),
        };

        url::Url::parse_with_params(
            &format!("{}/{endpoint}", self.base_url),
            &[
                ("q", q.as_str()),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ],
        )
        .map_err(|e| ProviderError::Transport(format!("Invalid provider URL: {e}")))
    }

    async fn get_json(&self, endpoint: &'static str, query: &CityQuery) -> Result<Value, ProviderError> {
        let url = self.endpoint_url(endpoint, query)?;
        debug!(endpoint, city = %query.city, "Calling weather provider");

        let result = self.send(url).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(ProviderError::Status { .. }) => "status_error",
            Err(ProviderError::Transport(_)) => "transport_error",
            Err(ProviderError::Parse { .. }) => "parse_error",
        };
        metrics::counter!(
            "provider_requests_total",
            "endpoint" => endpoint,
            "outcome" => outcome
        )
        .increment(1);

        result
    }

    async fn send(&self, url: url::Url) -> Result<Value, ProviderError> {
        let response = self.client.get(url).timeout(self.timeout).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }

        serde_json::from_str(&body).map_err(|_| parse_error("<body>"))
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    async fn fetch_current(&self, query: &CityQuery) -> Result<NewWeatherRecord, ProviderError> {
        let body = self.get_json("weather", query).await?;
        parse_current(&body)
    }

    async fn fetch_forecast(&self, query: &CityQuery) -> Result<ForecastData, ProviderError> {
        let body = self.get_json("forecast", query).await?;
        parse_forecast(&body)
    }
}

fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body)
        && let Some(message) = json.get("message").and_then(Value::as_str)
    {
        return message.to_string();
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    } else {
        trimmed.to_string()
    }
}

fn parse_error(field: &str) -> ProviderError {
    ProviderError::Parse {
        field: field.to_string(),
    }
}

fn required_str(body: &Value, pointer: &str, field: &str) -> Result<String, ProviderError> {
    body.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| parse_error(field))
}

fn required_f64(body: &Value, pointer: &str, field: &str) -> Result<f64, ProviderError> {
    body.pointer(pointer)
        .and_then(Value::as_f64)
        .ok_or_else(|| parse_error(field))
}

#[allow(clippy::cast_possible_truncation)]
fn required_i32(body: &Value, pointer: &str, field: &str) -> Result<i32, ProviderError> {
    required_f64(body, pointer, field).map(|v| v.round() as i32)
}

fn optional_country(body: &Value, pointer: &str) -> Option<String> {
    body.pointer(pointer)
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

pub(crate) fn parse_current(body: &Value) -> Result<NewWeatherRecord, ProviderError> {
    Ok(NewWeatherRecord {
        city: required_str(body, "/name", "name")?,
        country: optional_country(body, "/sys/country"),
        temperature: required_f64(body, "/main/temp", "main.temp")?,
        humidity: required_i32(body, "/main/humidity", "main.humidity")?,
        wind_speed: body
            .pointer("/wind/speed")
            .and_then(Value::as_f64)
            .unwrap_or(0.0),
        pressure: required_i32(body, "/main/pressure", "main.pressure")?,
        description: required_str(body, "/weather/0/description", "weather[0].description")?,
        icon: required_str(body, "/weather/0/icon", "weather[0].icon")?,
    })
}

pub(crate) fn parse_forecast(body: &Value) -> Result<ForecastData, ProviderError> {
    let city = required_str(body, "/city/name", "city.name")?;
    let country = optional_country(body, "/city/country");
    let list = body
        .get("list")
        .and_then(Value::as_array)
        .ok_or_else(|| parse_error("list"))?;

    let mut entries = Vec::with_capacity(list.len());
    for (i, item) in list.iter().enumerate() {
        let field = |name: &str| format!("list[{i}].{name}");

        let dt = item
            .get("dt")
            .and_then(Value::as_i64)
            .ok_or_else(|| parse_error(&field("dt")))?;
        let at = DateTime::from_timestamp(dt, 0).ok_or_else(|| parse_error(&field("dt")))?;

        entries.push(ForecastEntry {
            at,
            temperature: required_f64(item, "/main/temp", &field("main.temp"))?,
            humidity: required_i32(item, "/main/humidity", &field("main.humidity"))?,
            wind_speed: item
                .pointer("/wind/speed")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
            description: required_str(
                item,
                "/weather/0/description",
                &field("weather[0].description"),
            )?,
            icon: required_str(item, "/weather/0/icon", &field("weather[0].icon"))?,
        });
    }

    Ok(ForecastData {
        city,
        country,
        entries,
    })
}
