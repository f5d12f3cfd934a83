use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::state::SharedState;

mod error;
mod export;
mod jobs;
mod observability;
mod schedules;
mod system;
mod types;
mod validation;
mod weather;

pub use error::ApiError;
pub use types::*;

use tokio::sync::RwLock;

use crate::services::{JobQueue, WeatherService};
use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Arc<RwLock<Config>> {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn queue(&self) -> &JobQueue {
        &self.shared.queue
    }

    #[must_use]
    pub fn weather_service(&self) -> &Arc<dyn WeatherService> {
        &self.shared.weather_service
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub async fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config().read().await.server.cors_allowed_origins.clone();

    let api_router = create_api_router().with_state(state);

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
        .layer(middleware::from_fn(
            observability::security_headers_middleware,
        ))
}

fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/weather", get(weather::get_weather))
        .route("/forecast", get(weather::get_forecast))
        .route("/history", get(weather::get_history))
        .route("/history/{id}", get(weather::get_record))
        .route("/jobs", get(jobs::list_jobs).post(jobs::enqueue_job))
        .route("/jobs/kinds", get(jobs::list_job_kinds))
        .route("/jobs/{id}", get(jobs::get_job).delete(jobs::cancel_job))
        .route("/schedules", get(schedules::list_schedules))
        .route("/schedules/sync", post(schedules::sync))
        .route("/schedules/{name}/run", post(schedules::trigger))
        .route("/export", get(export::export_records))
        .route("/system/status", get(system::get_status))
        .route("/system/health", get(system::get_health))
        .route("/metrics", get(observability::get_metrics))
}
