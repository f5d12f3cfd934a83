use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, warn};

use super::JobError;
use crate::config::{AlertThresholds, JobsConfig};
use crate::db::{Comparison, NumericField, RecordFilter, RecordOrder, Store};
use crate::models::WeatherRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    ExtremeHeat,
    ExtremeCold,
    HighWind,
    HighHumidity,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeatherAlert {
    pub record_id: i64,
    pub city: String,
    pub country: Option<String>,
    pub temperature: f64,
    pub wind_speed: f64,
    pub humidity: i32,
    pub alert_types: Vec<AlertKind>,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertsReport {
    pub alerts_count: usize,
    pub alerts: Vec<WeatherAlert>,
    pub checked_at: DateTime<Utc>,
}

fn extreme_conditions(thresholds: &AlertThresholds) -> RecordFilter {
    RecordFilter::Or(vec![
        RecordFilter::Compare(
            NumericField::Temperature,
            Comparison::Gte,
            thresholds.heat_celsius,
        ),
        RecordFilter::Compare(
            NumericField::Temperature,
            Comparison::Lte,
            thresholds.cold_celsius,
        ),
        RecordFilter::Compare(NumericField::WindSpeed, Comparison::Gte, thresholds.wind_speed),
        RecordFilter::Compare(
            NumericField::Humidity,
            Comparison::Gte,
            f64::from(thresholds.humidity),
        ),
    ])
}

/// Every label that applies to the record; labels are not exclusive.
#[must_use]
pub fn classify(record: &WeatherRecord, thresholds: &AlertThresholds) -> Vec<AlertKind> {
    let mut kinds = Vec::new();
    if record.temperature >= thresholds.heat_celsius {
        kinds.push(AlertKind::ExtremeHeat);
    }
    if record.temperature <= thresholds.cold_celsius {
        kinds.push(AlertKind::ExtremeCold);
    }
    if record.wind_speed >= thresholds.wind_speed {
        kinds.push(AlertKind::HighWind);
    }
    if record.humidity >= thresholds.humidity {
        kinds.push(AlertKind::HighHumidity);
    }
    kinds
}

/// Flags extreme conditions seen in the trailing window. Nothing is sent.
pub async fn run(store: &Store, config: &JobsConfig) -> Result<AlertsReport, JobError> {
    let thresholds = &config.alerts;
    let since = Utc::now() - Duration::hours(thresholds.window_hours);
    let filter = RecordFilter::And(vec![
        RecordFilter::ObservedSince(since),
        extreme_conditions(thresholds),
    ]);

    let records = store
        .query_records(&filter, RecordOrder::NewestFirst, None)
        .await?;

    let mut seen = HashSet::new();
    let alerts: Vec<WeatherAlert> = records
        .into_iter()
        .filter(|r| seen.insert(r.id))
        .filter_map(|r| {
            let alert_types = classify(&r, thresholds);
            (!alert_types.is_empty()).then(|| WeatherAlert {
                record_id: r.id,
                city: r.city,
                country: r.country,
                temperature: r.temperature,
                wind_speed: r.wind_speed,
                humidity: r.humidity,
                alert_types,
                observed_at: r.observed_at,
            })
        })
        .collect();

    if alerts.is_empty() {
        info!("No extreme weather conditions detected");
    } else {
        warn!(
            alerts_count = alerts.len(),
            "Extreme weather conditions detected"
        );
    }

    Ok(AlertsReport {
        alerts_count: alerts.len(),
        alerts,
        checked_at: Utc::now(),
    })
}
