use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use super::JobError;
use crate::db::{RecordFilter, Store};

#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    pub city: String,
    pub search_count: u64,
    pub processed_at: DateTime<Utc>,
}

/// Follow-up of a lookup: how often the city has been searched so far.
pub async fn run(store: &Store, city: &str) -> Result<SearchReport, JobError> {
    let search_count = store
        .count_records(&RecordFilter::CityContains(city.to_string()))
        .await?;

    debug!(city, search_count, "Processed weather search");

    Ok(SearchReport {
        city: city.to_string(),
        search_count,
        processed_at: Utc::now(),
    })
}
