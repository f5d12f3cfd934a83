//! Domain service behind the city lookup and history endpoints.

use serde::Serialize;
use thiserror::Error;

use crate::clients::ProviderError;
use crate::models::{ForecastData, WeatherRecord};

pub const DEFAULT_HISTORY_LIMIT: u64 = 10;
pub const MAX_HISTORY_LIMIT: u64 = 1000;

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for WeatherError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<sea_orm::DbErr> for WeatherError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LookupOutcome {
    pub record: WeatherRecord,
    /// Follow-up search processing run, absent if it could not be enqueued.
    pub job_id: Option<String>,
}

#[async_trait::async_trait]
pub trait WeatherService: Send + Sync {
    /// Fetches current conditions, stores them and enqueues search processing.
    ///
    /// # Errors
    ///
    /// Returns [`WeatherError::InvalidInput`] for a blank city and
    /// [`WeatherError::Provider`] with the upstream status and message when
    /// the provider call fails after retries.
    async fn lookup(&self, city: &str, country: Option<&str>)
    -> Result<LookupOutcome, WeatherError>;

    async fn forecast(&self, city: &str) -> Result<ForecastData, WeatherError>;

    /// Newest-first history; `limit` defaults to 10 and must be within 1..=1000.
    async fn history(&self, limit: Option<u64>) -> Result<Vec<WeatherRecord>, WeatherError>;

    async fn get(&self, id: i64) -> Result<Option<WeatherRecord>, WeatherError>;
}

pub(crate) fn normalize_city(city: &str) -> Result<&str, WeatherError> {
    let city = city.trim();
    if city.is_empty() {
        return Err(WeatherError::InvalidInput("City is required".to_string()));
    }
    Ok(city)
}

pub(crate) fn validate_limit(limit: Option<u64>) -> Result<u64, WeatherError> {
    let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    if !(1..=MAX_HISTORY_LIMIT).contains(&limit) {
        return Err(WeatherError::InvalidInput(format!(
            "limit must be between 1 and {MAX_HISTORY_LIMIT}"
        )));
    }
    Ok(limit)
}
