use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use super::ApiResponse;
use crate::clients::ProviderError;
use crate::jobs::JobError;
use crate::services::{QueueError, WeatherError};

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),

    DatabaseError(String),

    /// Provider answered with an error status; passed through as-is.
    Upstream { status: u16, message: String },

    ExternalApiError { service: String, message: String },

    ValidationError(String),

    Conflict(String),

    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            ApiError::Upstream { status, message } => {
                write!(f, "Upstream error {}: {}", status, message)
            }
            ApiError::ExternalApiError { service, message } => {
                write!(f, "{} error: {}", service, message)
            }
            ApiError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred".to_string(),
                )
            }
            ApiError::Upstream { status, message } => {
                tracing::warn!("Weather provider returned {}: {}", status, message);
                (
                    StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                    message.clone(),
                )
            }
            ApiError::ExternalApiError { service, message } => {
                tracing::warn!("{} API error: {}", service, message);
                (StatusCode::BAD_GATEWAY, format!("{}: {}", service, message))
            }
            ApiError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ApiResponse::<()>::error(error_message);
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Status { status, message } => Self::Upstream { status, message },
            other => Self::provider_error(other.to_string()),
        }
    }
}

impl From<WeatherError> for ApiError {
    fn from(err: WeatherError) -> Self {
        match err {
            WeatherError::InvalidInput(msg) => Self::validation(msg),
            WeatherError::Provider(e) => e.into(),
            WeatherError::Database(msg) => Self::DatabaseError(msg),
        }
    }
}

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::InvalidJob(msg) => Self::validation(msg),
            QueueError::NotFound(id) => Self::not_found("Job run", id),
            QueueError::NotPending(id) => {
                Self::Conflict(format!("Job run {} is no longer pending", id))
            }
            QueueError::Storage(msg) => Self::DatabaseError(msg),
        }
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::InvalidInput(msg) => Self::validation(msg),
            JobError::Storage(msg) => Self::DatabaseError(msg),
            JobError::Internal(msg) => Self::internal(msg),
        }
    }
}

impl ApiError {
    pub fn not_found(resource: &str, id: impl fmt::Display) -> Self {
        ApiError::NotFound(format!("{} {} not found", resource, id))
    }

    pub fn record_not_found(id: i64) -> Self {
        ApiError::NotFound(format!("Weather record {} not found", id))
    }

    pub fn provider_error(msg: impl Into<String>) -> Self {
        ApiError::ExternalApiError {
            service: "OpenWeather".to_string(),
            message: msg.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::ValidationError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        ApiError::InternalError(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_status_passes_through() {
        let err: ApiError = WeatherError::Provider(ProviderError::Status {
            status: 404,
            message: "city not found".to_string(),
        })
        .into();

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_transport_maps_to_bad_gateway() {
        let err: ApiError =
            WeatherError::Provider(ProviderError::Transport("connection refused".into())).into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_queue_errors() {
        let conflict: ApiError = QueueError::NotPending("abc".into()).into();
        assert_eq!(conflict.into_response().status(), StatusCode::CONFLICT);

        let invalid: ApiError = QueueError::InvalidJob("nope".into()).into();
        assert_eq!(invalid.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
