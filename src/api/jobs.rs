use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde_json::Value;
use std::sync::Arc;

use super::validation::{validate_export_format, validate_job_limit, validate_job_name};
use super::{
    ApiError, ApiResponse, AppState, CancelJobResponse, EnqueueJobRequest, EnqueueJobResponse,
    LimitParams,
};
use crate::jobs::{JobKind, JobRequest};
use crate::models::JobRun;
use crate::services::EnqueueOptions;

/// `GET /api/jobs?limit=<n>`, most recently enqueued first.
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitParams>,
) -> Result<Json<ApiResponse<Vec<JobRun>>>, ApiError> {
    let limit = validate_job_limit(params.limit)?;
    let runs = state.queue().list(limit).await?;
    Ok(Json(ApiResponse::success(runs)))
}

/// Queues a job by name.
///
/// # Endpoint
/// `POST /api/jobs` with `{"job": "bulk_update", "args": {"cities": [...]}}`
///
/// Arguments are validated before anything is stored; an export request
/// with an unknown format is rejected here rather than failing later.
pub async fn enqueue_job(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EnqueueJobRequest>,
) -> Result<(StatusCode, Json<ApiResponse<EnqueueJobResponse>>), ApiError> {
    let job = validate_job_name(&payload.job)?;
    let args = payload.args.unwrap_or_else(|| Value::Object(serde_json::Map::new()));

    let request = JobRequest::from_parts(job, &args)?;
    if let JobRequest::ExportData { format } = &request {
        validate_export_format(Some(format.as_str()))?;
    }

    let id = state
        .queue()
        .enqueue(&request, EnqueueOptions::default())
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(EnqueueJobResponse {
            id,
            job: request.kind().to_string(),
        })),
    ))
}

pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<JobRun>>, ApiError> {
    let run = state
        .queue()
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job run", &id))?;

    Ok(Json(ApiResponse::success(run)))
}

/// Cancels a run that has not started.
///
/// # Endpoint
/// `DELETE /api/jobs/{id}`
///
/// Responds 404 for an unknown run and 409 once a worker has claimed it.
pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<CancelJobResponse>>, ApiError> {
    let queue = state.queue();

    if queue.get(&id).await?.is_none() {
        return Err(ApiError::not_found("Job run", &id));
    }

    if !queue.cancel(&id).await? {
        return Err(ApiError::Conflict(format!(
            "Job run {} is no longer pending",
            id
        )));
    }

    Ok(Json(ApiResponse::success(CancelJobResponse {
        id,
        cancelled: true,
    })))
}

/// `GET /api/jobs/kinds`
pub async fn list_job_kinds() -> Json<ApiResponse<Vec<&'static str>>> {
    Json(ApiResponse::success(
        JobKind::ALL.iter().map(|kind| kind.as_str()).collect(),
    ))
}
