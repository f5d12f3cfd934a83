//! System API endpoints.

use axum::{Json, extract::State};
use serde::Serialize;
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, JobCounts, SystemStatus};
use crate::db::RecordFilter;
use crate::models::JobStatus;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: bool,
}

/// Returns service status.
///
/// # Endpoint
/// `GET /api/system/status`
///
/// Includes uptime, stored record count and queue depth per run status.
pub async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<SystemStatus>>, ApiError> {
    let records = state.store().count_records(&RecordFilter::Any).await?;

    let queue = state.queue();
    let (pending, running, succeeded, failed, cancelled) = futures::try_join!(
        queue.count(JobStatus::Pending),
        queue.count(JobStatus::Running),
        queue.count(JobStatus::Succeeded),
        queue.count(JobStatus::Failed),
        queue.count(JobStatus::Cancelled),
    )?;
    let jobs = JobCounts {
        pending,
        running,
        succeeded,
        failed,
        cancelled,
    };

    let scheduler_enabled = state.shared.config.read().await.scheduler.enabled;

    Ok(Json(ApiResponse::success(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: state.start_time.elapsed().as_secs(),
        records,
        jobs,
        scheduler_enabled,
    })))
}

/// `GET /api/system/health`
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthResponse>> {
    let database = state.store().ping().await.is_ok();

    Json(ApiResponse::success(HealthResponse {
        status: if database { "ok" } else { "degraded" },
        database,
    }))
}
