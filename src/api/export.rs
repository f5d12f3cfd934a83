use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::validation::validate_export_format;
use super::{ApiError, AppState, ExportParams};
use crate::jobs::export::export_all;

/// Downloads every stored record.
///
/// # Endpoint
/// `GET /api/export?format=json|csv`
pub async fn export_records(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ExportParams>,
) -> Result<Response, ApiError> {
    let format = validate_export_format(params.format.as_deref())?;
    let (data, records_count) = export_all(state.store(), format).await?;

    tracing::debug!(records_count, format = format.as_str(), "Serving export download");

    let disposition = format!(
        "attachment; filename=\"weather_export.{}\"",
        format.as_str()
    );

    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    )
        .into_response())
}
