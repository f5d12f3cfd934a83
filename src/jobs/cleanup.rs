use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::info;

use super::JobError;
use crate::config::JobsConfig;
use crate::db::{RecordFilter, Store};

#[derive(Debug, Clone, Serialize)]
pub struct CleanupReport {
    pub deleted_count: u64,
    pub cutoff: DateTime<Utc>,
}

/// Deletes records older than the retention window. Running it again right
/// away deletes nothing.
pub async fn run(store: &Store, config: &JobsConfig) -> Result<CleanupReport, JobError> {
    let cutoff = Utc::now() - Duration::days(config.retention_days);
    let deleted_count = store
        .delete_records(&RecordFilter::ObservedBefore(cutoff))
        .await?;

    info!(deleted_count, cutoff = %cutoff, "Old weather records cleaned up");

    Ok(CleanupReport {
        deleted_count,
        cutoff,
    })
}
