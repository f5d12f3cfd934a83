use axum::{
    Json,
    extract::{Path, Query, State},
};
use std::sync::Arc;

use super::validation::validate_record_id;
use super::{ApiError, ApiResponse, AppState, CityParams, LimitParams};
use crate::models::{ForecastData, WeatherRecord};
use crate::services::LookupOutcome;

/// Looks up current conditions for a city.
///
/// # Endpoint
/// `GET /api/weather?city=<name>&country=<code>`
///
/// Stores the observation and queues follow-up search processing. Provider
/// errors keep their upstream status and message.
pub async fn get_weather(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CityParams>,
) -> Result<Json<ApiResponse<LookupOutcome>>, ApiError> {
    let outcome = state
        .weather_service()
        .lookup(&params.city, params.country.as_deref())
        .await?;

    Ok(Json(ApiResponse::success(outcome)))
}

/// `GET /api/forecast?city=<name>`
pub async fn get_forecast(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CityParams>,
) -> Result<Json<ApiResponse<ForecastData>>, ApiError> {
    let forecast = state.weather_service().forecast(&params.city).await?;
    Ok(Json(ApiResponse::success(forecast)))
}

/// `GET /api/history?limit=<n>`, newest first.
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitParams>,
) -> Result<Json<ApiResponse<Vec<WeatherRecord>>>, ApiError> {
    let records = state.weather_service().history(params.limit).await?;
    Ok(Json(ApiResponse::success(records)))
}

pub async fn get_record(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<WeatherRecord>>, ApiError> {
    let id = validate_record_id(id)?;

    let record = state
        .weather_service()
        .get(id)
        .await?
        .ok_or_else(|| ApiError::record_not_found(id))?;

    Ok(Json(ApiResponse::success(record)))
}
