//! Work queue and worker pool behaviour on a shared SQLite file.

use chrono::{Duration as ChronoDuration, Utc};
use meteod::config::Config;
use meteod::jobs::JobRequest;
use meteod::models::{CityQuery, JobRun, JobStatus, NewWeatherRecord, Progress};
use meteod::services::{EnqueueOptions, JobQueue, WorkerPool};
use meteod::state::SharedState;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn shared_state(provider_url: &str) -> SharedState {
    let db_path =
        std::env::temp_dir().join(format!("meteod-worker-test-{}.db", uuid::Uuid::new_v4()));

    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", db_path.display());
    config.provider.base_url = provider_url.to_string();
    config.provider.timeout_seconds = 2;
    config.jobs.bulk_update_pause_ms = 0;

    SharedState::new(config)
        .await
        .expect("Failed to create shared state")
}

async fn wait_for_terminal(queue: &JobQueue, id: &str) -> JobRun {
    for _ in 0..100 {
        let run = queue.get(id).await.unwrap().unwrap();
        if run.status.is_terminal() {
            return run;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("job run {id} did not finish in time");
}

fn start_pool(state: &SharedState) -> WorkerPool {
    WorkerPool::new(state.queue.clone(), state.runner.clone())
}

#[tokio::test]
async fn test_concurrent_claims_take_a_run_once() {
    let server = MockServer::start().await;
    let state = shared_state(&server.uri()).await;
    let queue = &state.queue;

    let id = queue
        .enqueue(&JobRequest::Cleanup, EnqueueOptions::default())
        .await
        .unwrap();

    let (a, b) = tokio::join!(queue.claim_next(), queue.claim_next());
    let claimed: Vec<JobRun> = [a.unwrap(), b.unwrap()].into_iter().flatten().collect();

    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, id);
    assert_eq!(claimed[0].status, JobStatus::Running);
    assert!(claimed[0].started_at.is_some());

    assert!(!queue.cancel(&id).await.unwrap());
}

#[tokio::test]
async fn test_pool_runs_jobs_and_skips_cancelled() {
    let server = MockServer::start().await;
    let state = shared_state(&server.uri()).await;
    let queue = &state.queue;

    state
        .store
        .insert_record_at(
            &NewWeatherRecord {
                city: "Rome".to_string(),
                country: None,
                temperature: 20.0,
                humidity: 40,
                wind_speed: 1.0,
                pressure: 1015,
                description: "clear sky".to_string(),
                icon: "01d".to_string(),
            },
            Utc::now() - ChronoDuration::days(90),
        )
        .await
        .unwrap();

    let withdrawn = queue
        .enqueue(&JobRequest::GenerateStatistics, EnqueueOptions::default())
        .await
        .unwrap();
    assert!(queue.cancel(&withdrawn).await.unwrap());

    let mut pool = start_pool(&state);
    pool.start(2, Duration::from_millis(50)).await;
    assert!(pool.is_running().await);

    let id = queue
        .enqueue(&JobRequest::Cleanup, EnqueueOptions::default())
        .await
        .unwrap();

    let run = wait_for_terminal(queue, &id).await;
    assert_eq!(run.status, JobStatus::Succeeded);
    assert_eq!(run.result.unwrap()["deleted_count"], 1);
    assert!(run.finished_at.is_some());

    pool.shutdown().await;
    assert!(!pool.is_running().await);

    let cancelled = queue.get(&withdrawn).await.unwrap().unwrap();
    assert_eq!(cancelled.status, JobStatus::Cancelled);
    assert!(cancelled.started_at.is_none());
    assert!(cancelled.result.is_none());
}

#[tokio::test]
async fn test_expired_run_is_failed_instead_of_executed() {
    let server = MockServer::start().await;
    let state = shared_state(&server.uri()).await;
    let queue = &state.queue;

    let id = queue
        .enqueue(
            &JobRequest::Cleanup,
            EnqueueOptions {
                expires_at: Some(Utc::now() - ChronoDuration::seconds(1)),
                ..EnqueueOptions::default()
            },
        )
        .await
        .unwrap();

    assert!(queue.claim_next().await.unwrap().is_none());

    let run = queue.get(&id).await.unwrap().unwrap();
    assert_eq!(run.status, JobStatus::Failed);
    assert_eq!(run.error.as_deref(), Some("expired"));
    assert!(run.result.is_none());
}

#[tokio::test]
async fn test_failed_job_records_error() {
    let server = MockServer::start().await;
    let state = shared_state(&server.uri()).await;
    let queue = &state.queue;

    let id = queue
        .enqueue(
            &JobRequest::ExportData {
                format: "xml".to_string(),
            },
            EnqueueOptions::default(),
        )
        .await
        .unwrap();

    let mut pool = start_pool(&state);
    pool.start(1, Duration::from_millis(50)).await;
    let run = wait_for_terminal(queue, &id).await;
    pool.shutdown().await;

    assert_eq!(run.status, JobStatus::Failed);
    assert!(run.error.unwrap().contains("xml"));
}

#[tokio::test]
async fn test_bulk_update_progress_is_persisted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "Lisbon",
            "sys": {"country": "PT"},
            "main": {"temp": 19.0, "humidity": 65, "pressure": 1018},
            "wind": {"speed": 5.0},
            "weather": [{"description": "few clouds", "icon": "02d"}]
        })))
        .mount(&server)
        .await;

    let state = shared_state(&server.uri()).await;
    let queue = &state.queue;

    let id = queue
        .enqueue(
            &JobRequest::BulkUpdate {
                cities: vec![CityQuery::new("Lisbon"), CityQuery::new("Porto")],
            },
            EnqueueOptions {
                queue: Some("bulk".to_string()),
                ..EnqueueOptions::default()
            },
        )
        .await
        .unwrap();

    let mut pool = start_pool(&state);
    pool.start(1, Duration::from_millis(50)).await;
    let run = wait_for_terminal(queue, &id).await;
    pool.shutdown().await;

    assert_eq!(run.status, JobStatus::Succeeded);
    assert_eq!(run.queue.as_deref(), Some("bulk"));
    assert_eq!(
        run.progress,
        Some(Progress {
            current: 2,
            total: 2
        })
    );
    assert_eq!(run.result.unwrap()["successful"], 2);
}

#[tokio::test]
async fn test_recover_interrupted_runs() {
    let server = MockServer::start().await;
    let state = shared_state(&server.uri()).await;
    let queue = &state.queue;

    let id = queue
        .enqueue(&JobRequest::SendAlerts, EnqueueOptions::default())
        .await
        .unwrap();
    let claimed = queue.claim_next().await.unwrap().unwrap();
    assert_eq!(claimed.id, id);

    assert_eq!(queue.recover_interrupted().await.unwrap(), 1);

    let run = queue.get(&id).await.unwrap().unwrap();
    assert_eq!(run.status, JobStatus::Failed);
    assert_eq!(run.error.as_deref(), Some("interrupted"));
}
