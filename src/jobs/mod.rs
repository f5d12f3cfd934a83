//! Background job units.
//!
//! Every unit reads its policy from [`JobsConfig`], works against the
//! [`Store`] (and the provider for bulk updates) and returns a
//! JSON-serializable report.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::clients::WeatherProvider;
use crate::config::JobsConfig;
use crate::db::Store;
use crate::models::CityQuery;

pub mod alerts;
pub mod bulk_update;
pub mod cleanup;
pub mod export;
pub mod maintenance;
pub mod process_search;
pub mod statistics;

pub use export::{ExportFormat, render_export};

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for JobError {
    fn from(err: anyhow::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<sea_orm::DbErr> for JobError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for JobError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    GenerateStatistics,
    Cleanup,
    BulkUpdate,
    SendAlerts,
    DatabaseMaintenance,
    ExportData,
    ProcessSearch,
}

impl JobKind {
    pub const ALL: [Self; 7] = [
        Self::GenerateStatistics,
        Self::Cleanup,
        Self::BulkUpdate,
        Self::SendAlerts,
        Self::DatabaseMaintenance,
        Self::ExportData,
        Self::ProcessSearch,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GenerateStatistics => "generate_statistics",
            Self::Cleanup => "cleanup",
            Self::BulkUpdate => "bulk_update",
            Self::SendAlerts => "send_alerts",
            Self::DatabaseMaintenance => "database_maintenance",
            Self::ExportData => "export_data",
            Self::ProcessSearch => "process_search",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| JobError::InvalidInput(format!("Unknown job: {s}")))
    }
}

/// A fully-typed job invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobRequest {
    GenerateStatistics,
    Cleanup,
    BulkUpdate { cities: Vec<CityQuery> },
    SendAlerts,
    DatabaseMaintenance,
    /// Format is checked when the job runs so that a bad value fails the run.
    ExportData { format: String },
    ProcessSearch { city: String },
}

impl JobRequest {
    /// Builds a request from a job name and its JSON argument object.
    pub fn from_parts(job: &str, args: &Value) -> Result<Self, JobError> {
        let kind: JobKind = job.parse()?;

        let request = match kind {
            JobKind::GenerateStatistics => Self::GenerateStatistics,
            JobKind::Cleanup => Self::Cleanup,
            JobKind::SendAlerts => Self::SendAlerts,
            JobKind::DatabaseMaintenance => Self::DatabaseMaintenance,
            JobKind::BulkUpdate => {
                let cities = args.get("cities").cloned().ok_or_else(|| {
                    JobError::InvalidInput("bulk_update requires a 'cities' list".to_string())
                })?;
                let cities: Vec<CityQuery> = serde_json::from_value(cities).map_err(|e| {
                    JobError::InvalidInput(format!("Invalid 'cities' list: {e}"))
                })?;
                Self::BulkUpdate { cities }
            }
            JobKind::ExportData => Self::ExportData {
                format: args
                    .get("format")
                    .and_then(Value::as_str)
                    .unwrap_or("json")
                    .to_string(),
            },
            JobKind::ProcessSearch => {
                let city = args
                    .get("city")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .ok_or_else(|| {
                        JobError::InvalidInput("process_search requires a 'city'".to_string())
                    })?;
                Self::ProcessSearch {
                    city: city.to_string(),
                }
            }
        };

        Ok(request)
    }

    #[must_use]
    pub const fn kind(&self) -> JobKind {
        match self {
            Self::GenerateStatistics => JobKind::GenerateStatistics,
            Self::Cleanup => JobKind::Cleanup,
            Self::BulkUpdate { .. } => JobKind::BulkUpdate,
            Self::SendAlerts => JobKind::SendAlerts,
            Self::DatabaseMaintenance => JobKind::DatabaseMaintenance,
            Self::ExportData { .. } => JobKind::ExportData,
            Self::ProcessSearch { .. } => JobKind::ProcessSearch,
        }
    }

    /// JSON argument object, the inverse of [`JobRequest::from_parts`].
    #[must_use]
    pub fn args(&self) -> Value {
        match self {
            Self::BulkUpdate { cities } => json!({ "cities": cities }),
            Self::ExportData { format } => json!({ "format": format }),
            Self::ProcessSearch { city } => json!({ "city": city }),
            _ => json!({}),
        }
    }
}

/// Receives progress of long-running jobs.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn report(&self, current: u32, total: u32);
}

pub struct NoProgress;

#[async_trait]
impl ProgressReporter for NoProgress {
    async fn report(&self, _current: u32, _total: u32) {}
}

/// Executes job requests against the shared store.
#[derive(Clone)]
pub struct JobRunner {
    store: Store,
    provider: Arc<dyn WeatherProvider>,
    config: JobsConfig,
}

impl JobRunner {
    #[must_use]
    pub fn new(store: Store, provider: Arc<dyn WeatherProvider>, config: JobsConfig) -> Self {
        Self {
            store,
            provider,
            config,
        }
    }

    pub async fn execute(
        &self,
        request: &JobRequest,
        progress: &dyn ProgressReporter,
    ) -> Result<Value, JobError> {
        match request {
            JobRequest::GenerateStatistics => {
                to_report(statistics::run(&self.store, &self.config).await?)
            }
            JobRequest::Cleanup => to_report(cleanup::run(&self.store, &self.config).await?),
            JobRequest::BulkUpdate { cities } => to_report(
                bulk_update::run(
                    &self.store,
                    self.provider.as_ref(),
                    cities,
                    &self.config,
                    progress,
                )
                .await?,
            ),
            JobRequest::SendAlerts => to_report(alerts::run(&self.store, &self.config).await?),
            JobRequest::DatabaseMaintenance => {
                to_report(maintenance::run(&self.store, &self.config).await?)
            }
            JobRequest::ExportData { format } => {
                to_report(export::run(&self.store, format, &self.config).await?)
            }
            JobRequest::ProcessSearch { city } => {
                to_report(process_search::run(&self.store, city).await?)
            }
        }
    }
}

fn to_report<T: Serialize>(report: T) -> Result<Value, JobError> {
    Ok(serde_json::to_value(report)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_kind_names() {
        for kind in JobKind::ALL {
            assert_eq!(kind.as_str().parse::<JobKind>().unwrap(), kind);
        }
        assert!(matches!(
            "reticulate_splines".parse::<JobKind>(),
            Err(JobError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_from_parts_bulk_update() {
        let request = JobRequest::from_parts(
            "bulk_update",
            &json!({"cities": [{"city": "Paris", "country": "FR"}, {"city": "Oslo"}]}),
        )
        .unwrap();

        assert_eq!(
            request,
            JobRequest::BulkUpdate {
                cities: vec![
                    CityQuery::new("Paris").with_country("FR"),
                    CityQuery::new("Oslo"),
                ]
            }
        );
        assert_eq!(
            JobRequest::from_parts("bulk_update", &request.args()).unwrap(),
            request
        );
    }

    #[test]
    fn test_from_parts_rejects_missing_args() {
        assert!(JobRequest::from_parts("bulk_update", &json!({})).is_err());
        assert!(JobRequest::from_parts("process_search", &json!({"city": "  "})).is_err());
    }

    #[test]
    fn test_export_defaults_to_json() {
        assert_eq!(
            JobRequest::from_parts("export_data", &json!({})).unwrap(),
            JobRequest::ExportData {
                format: "json".to_string()
            }
        );
    }
}
