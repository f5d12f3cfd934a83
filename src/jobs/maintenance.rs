use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use super::JobError;
use crate::config::JobsConfig;
use crate::db::{Comparison, NumericField, RecordFilter, Store};
use crate::models::weather::{HUMIDITY_RANGE, PRESSURE_RANGE, TEMPERATURE_RANGE};

#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceReport {
    pub maintenance_actions: Vec<String>,
    /// One `"<city> (<day>): <n> records removed"` line per trimmed group.
    pub duplicates_cleaned: Vec<String>,
    pub inconsistent_data_cleaned: u64,
    pub maintenance_date: DateTime<Utc>,
}

/// Matches every record with a field outside its plausible range.
#[must_use]
pub fn out_of_bounds() -> RecordFilter {
    let outside = |field, lo: f64, hi: f64| {
        [
            RecordFilter::Compare(field, Comparison::Lt, lo),
            RecordFilter::Compare(field, Comparison::Gt, hi),
        ]
    };

    RecordFilter::Or(
        [
            outside(
                NumericField::Temperature,
                *TEMPERATURE_RANGE.start(),
                *TEMPERATURE_RANGE.end(),
            ),
            outside(
                NumericField::Humidity,
                f64::from(*HUMIDITY_RANGE.start()),
                f64::from(*HUMIDITY_RANGE.end()),
            ),
            outside(
                NumericField::Pressure,
                f64::from(*PRESSURE_RANGE.start()),
                f64::from(*PRESSURE_RANGE.end()),
            ),
        ]
        .into_iter()
        .flatten()
        .collect(),
    )
}

pub async fn run(store: &Store, config: &JobsConfig) -> Result<MaintenanceReport, JobError> {
    let mut maintenance_actions = Vec::new();

    if store.supports_analyze() {
        store.analyze().await?;
        maintenance_actions.push("Table statistics refreshed".to_string());
    } else {
        info!("Statistics refresh not supported by this database, skipping");
    }

    let trimmed = store
        .trim_daily_duplicates(config.duplicate_threshold, config.duplicate_keep)
        .await?;
    let duplicates_cleaned: Vec<String> = trimmed
        .iter()
        .filter(|group| group.removed > 0)
        .map(|group| format!("{} ({}): {} records removed", group.city, group.day, group.removed))
        .collect();

    let inconsistent_data_cleaned = store.delete_records(&out_of_bounds()).await?;
    if inconsistent_data_cleaned > 0 {
        maintenance_actions.push(format!(
            "{inconsistent_data_cleaned} inconsistent records removed"
        ));
    }

    info!(
        actions = maintenance_actions.len(),
        duplicate_groups = duplicates_cleaned.len(),
        inconsistent_data_cleaned,
        "Database maintenance finished"
    );

    Ok(MaintenanceReport {
        maintenance_actions,
        duplicates_cleaned,
        inconsistent_data_cleaned,
        maintenance_date: Utc::now(),
    })
}
