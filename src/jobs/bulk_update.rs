use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

use super::{JobError, ProgressReporter};
use crate::clients::WeatherProvider;
use crate::config::JobsConfig;
use crate::db::Store;
use crate::models::CityQuery;

#[derive(Debug, Clone, Serialize)]
pub struct UpdatedCity {
    pub city: String,
    pub temperature: f64,
    pub id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkUpdateReport {
    pub updated_cities: Vec<UpdatedCity>,
    /// One `"<city>: <error>"` line per failed item.
    pub errors: Vec<String>,
    pub total_processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub processed_at: DateTime<Utc>,
}

/// Refreshes each city in input order. A failing provider call is recorded
/// and the batch moves on; only a storage failure aborts the run.
pub async fn run(
    store: &Store,
    provider: &dyn WeatherProvider,
    cities: &[CityQuery],
    config: &JobsConfig,
    progress: &dyn ProgressReporter,
) -> Result<BulkUpdateReport, JobError> {
    let total = u32::try_from(cities.len()).unwrap_or(u32::MAX);
    let pause = Duration::from_millis(config.bulk_update_pause_ms);

    let mut updated_cities = Vec::new();
    let mut errors = Vec::new();

    for (i, query) in cities.iter().enumerate() {
        match provider.fetch_current(query).await {
            Ok(record) => {
                let id = store.insert_record(&record).await?;
                updated_cities.push(UpdatedCity {
                    city: record.city,
                    temperature: record.temperature,
                    id,
                });
                let current = u32::try_from(i + 1).unwrap_or(u32::MAX);
                progress.report(current, total).await;
            }
            Err(e) => {
                warn!(city = %query.city, error = %e, "Bulk update item failed");
                errors.push(format!("{}: {e}", query.city));
            }
        }

        if !pause.is_zero() && i + 1 < cities.len() {
            tokio::time::sleep(pause).await;
        }
    }

    info!(
        successful = updated_cities.len(),
        failed = errors.len(),
        "Bulk weather update finished"
    );

    Ok(BulkUpdateReport {
        successful: updated_cities.len(),
        failed: errors.len(),
        total_processed: cities.len(),
        updated_cities,
        errors,
        processed_at: Utc::now(),
    })
}
