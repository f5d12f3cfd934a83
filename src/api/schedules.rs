use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Serialize;
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, SyncParams};
use crate::models::ScheduleEntry;
use crate::services::{SyncMode, SyncReport, scheduler, sync_schedules};

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub name: String,
    /// Absent when the entry is disabled or expired.
    pub run_id: Option<String>,
}

pub async fn list_schedules(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<ScheduleEntry>>>, ApiError> {
    let entries = state.store().list_schedules().await?;
    Ok(Json(ApiResponse::success(entries)))
}

/// Writes the configured schedule definitions to the store.
///
/// # Endpoint
/// `POST /api/schedules/sync?replace=<bool>&dry_run=<bool>`
///
/// Per-entry rejections are part of the report, not an error response.
/// A running scheduler picks up the changes on its next start.
pub async fn sync(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SyncParams>,
) -> Result<Json<ApiResponse<SyncReport>>, ApiError> {
    let definitions = state.shared.config().await.schedules;

    let report = sync_schedules(
        state.store(),
        &definitions,
        SyncMode {
            replace: params.replace,
            dry_run: params.dry_run,
        },
    )
    .await;

    Ok(Json(ApiResponse::success(report)))
}

/// `POST /api/schedules/{name}/run` enqueues the entry's job now.
pub async fn trigger(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<TriggerResponse>>, ApiError> {
    if state.store().get_schedule(&name).await?.is_none() {
        return Err(ApiError::not_found("Schedule", &name));
    }

    let run_id = scheduler::fire(state.store(), state.queue(), &name).await?;
    Ok(Json(ApiResponse::success(TriggerResponse { name, run_id })))
}
