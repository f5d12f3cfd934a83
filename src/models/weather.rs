use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

use crate::entities::weather_records;

/// Plausible physical range for a surface temperature reading in °C.
pub const TEMPERATURE_RANGE: RangeInclusive<f64> = -50.0..=60.0;

pub const HUMIDITY_RANGE: RangeInclusive<i32> = 0..=100;

/// Sea-level pressure range in hPa.
pub const PRESSURE_RANGE: RangeInclusive<i32> = 800..=1100;

/// One persisted observation for a city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub id: i64,
    pub city: String,
    pub country: Option<String>,
    pub temperature: f64,
    pub humidity: i32,
    pub wind_speed: f64,
    pub pressure: i32,
    pub description: String,
    pub icon: String,
    pub observed_at: DateTime<Utc>,
}

impl WeatherRecord {
    /// Returns the name of the first field outside its plausible range.
    #[must_use]
    pub fn violated_bound(&self) -> Option<&'static str> {
        if !TEMPERATURE_RANGE.contains(&self.temperature) {
            return Some("temperature");
        }
        if !HUMIDITY_RANGE.contains(&self.humidity) {
            return Some("humidity");
        }
        if !PRESSURE_RANGE.contains(&self.pressure) {
            return Some("pressure");
        }
        None
    }

    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.violated_bound().is_none()
    }
}

impl From<weather_records::Model> for WeatherRecord {
    fn from(model: weather_records::Model) -> Self {
        Self {
            id: model.id,
            city: model.city,
            country: model.country,
            temperature: model.temperature,
            humidity: model.humidity,
            wind_speed: model.wind_speed,
            pressure: model.pressure,
            description: model.description,
            icon: model.icon,
            observed_at: model.observed_at,
        }
    }
}

/// Insert payload: everything except the store-assigned id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWeatherRecord {
    pub city: String,
    pub country: Option<String>,
    pub temperature: f64,
    pub humidity: i32,
    pub wind_speed: f64,
    pub pressure: i32,
    pub description: String,
    pub icon: String,
}

/// A city to refresh, optionally narrowed by ISO country code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityQuery {
    pub city: String,
    #[serde(default)]
    pub country: Option<String>,
}

impl CityQuery {
    #[must_use]
    pub fn new(city: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            country: None,
        }
    }

    #[must_use]
    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }
}

/// Multi-day forecast returned by the provider. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastData {
    pub city: String,
    pub country: Option<String>,
    pub entries: Vec<ForecastEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastEntry {
    pub at: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: i32,
    pub wind_speed: f64,
    pub description: String,
    pub icon: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(temperature: f64, humidity: i32, pressure: i32) -> WeatherRecord {
        WeatherRecord {
            id: 1,
            city: "Lyon".to_string(),
            country: Some("FR".to_string()),
            temperature,
            humidity,
            wind_speed: 2.0,
            pressure,
            description: "clear sky".to_string(),
            icon: "01d".to_string(),
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn test_bounds_are_inclusive() {
        assert!(record(-50.0, 0, 800).is_consistent());
        assert!(record(60.0, 100, 1100).is_consistent());
    }

    #[test]
    fn test_violated_bound_names_field() {
        assert_eq!(record(61.0, 50, 1000).violated_bound(), Some("temperature"));
        assert_eq!(record(20.0, 101, 1000).violated_bound(), Some("humidity"));
        assert_eq!(record(20.0, 50, 799).violated_bound(), Some("pressure"));
    }
}
