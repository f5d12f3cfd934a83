//! Schedule synchronization and firing against a real database.

use meteod::config::default_schedules;
use meteod::db::Store;
use meteod::models::{Cadence, CrontabFields, JobStatus, ScheduleDefinition};
use meteod::services::{EnqueueOptions, JobQueue, SyncAction, SyncMode, scheduler, sync_schedules};
use serde_json::json;

async fn test_store() -> Store {
    let db_path =
        std::env::temp_dir().join(format!("meteod-sched-test-{}.db", uuid::Uuid::new_v4()));
    Store::new(&format!("sqlite:{}", db_path.display()))
        .await
        .expect("Failed to open test database")
}

fn apply() -> SyncMode {
    SyncMode::default()
}

#[tokio::test]
async fn test_sync_is_idempotent() {
    let store = test_store().await;
    let definitions = default_schedules();

    let first = sync_schedules(&store, &definitions, apply()).await;
    assert_eq!(first.created, definitions.len());
    assert!(first.errors.is_empty(), "{:?}", first.errors);

    let second = sync_schedules(&store, &definitions, apply()).await;
    assert_eq!(second.created, 0);
    assert_eq!(second.updated, 0);
    assert_eq!(second.skipped, definitions.len());
    assert!(
        second
            .entries
            .iter()
            .all(|entry| entry.action == SyncAction::Skipped)
    );

    assert_eq!(store.list_schedules().await.unwrap().len(), definitions.len());
}

#[tokio::test]
async fn test_default_schedules_persist_expected_crontabs() {
    let store = test_store().await;
    sync_schedules(&store, &default_schedules(), apply()).await;

    let maintenance = store
        .get_schedule("database-maintenance")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(maintenance.job, "database_maintenance");
    assert_eq!(maintenance.crontab.to_string(), "0 3 * * Sun");

    let export = store
        .get_schedule("export-weather-data")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(export.args, Some(json!({"format": "csv"})));
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let store = test_store().await;
    let definitions = default_schedules();

    let report = sync_schedules(
        &store,
        &definitions,
        SyncMode {
            replace: false,
            dry_run: true,
        },
    )
    .await;

    assert!(report.dry_run);
    assert_eq!(report.created, definitions.len());
    assert!(store.list_schedules().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_replace_updates_existing_entries() {
    let store = test_store().await;
    let original = vec![ScheduleDefinition::crontab(
        "nightly-cleanup",
        "cleanup",
        CrontabFields::new("0", "2", "*"),
    )];
    sync_schedules(&store, &original, apply()).await;

    let changed = vec![ScheduleDefinition::crontab(
        "nightly-cleanup",
        "cleanup",
        CrontabFields::new("30", "1", "*"),
    )];

    let skipped = sync_schedules(&store, &changed, apply()).await;
    assert_eq!(skipped.skipped, 1);
    let entry = store.get_schedule("nightly-cleanup").await.unwrap().unwrap();
    assert_eq!(entry.crontab.hour, "2");

    let dry = sync_schedules(
        &store,
        &changed,
        SyncMode {
            replace: true,
            dry_run: true,
        },
    )
    .await;
    assert_eq!(dry.updated, 1);
    let entry = store.get_schedule("nightly-cleanup").await.unwrap().unwrap();
    assert_eq!(entry.crontab.hour, "2");

    let replaced = sync_schedules(
        &store,
        &changed,
        SyncMode {
            replace: true,
            dry_run: false,
        },
    )
    .await;
    assert_eq!(replaced.updated, 1);
    let entry = store.get_schedule("nightly-cleanup").await.unwrap().unwrap();
    assert_eq!(entry.crontab.minute, "30");
    assert_eq!(entry.crontab.hour, "1");
    assert_eq!(store.list_schedules().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_definitions_are_reported_and_do_not_block_others() {
    let store = test_store().await;

    let interval = ScheduleDefinition {
        cadence: Cadence::Interval { every_seconds: 60 },
        ..ScheduleDefinition::crontab("every-minute", "cleanup", CrontabFields::default())
    };
    let unknown_job = ScheduleDefinition::crontab(
        "mystery",
        "reticulate_splines",
        CrontabFields::new("0", "*", "*"),
    );
    let bad_cron = ScheduleDefinition::crontab(
        "bad-cron",
        "cleanup",
        CrontabFields::new("61", "*", "*"),
    );
    let bad_args = ScheduleDefinition::crontab(
        "bad-args",
        "export_data",
        CrontabFields::new("0", "4", "*"),
    )
    .with_args(json!(["csv"]));
    let good = ScheduleDefinition::crontab(
        "hourly-stats",
        "generate_statistics",
        CrontabFields::new("0", "*", "*"),
    );
    let duplicate = ScheduleDefinition::crontab(
        "hourly-stats",
        "cleanup",
        CrontabFields::new("15", "*", "*"),
    );

    let report = sync_schedules(
        &store,
        &[interval, unknown_job, bad_cron, bad_args, good, duplicate],
        apply(),
    )
    .await;

    assert_eq!(report.created, 1);
    let rejected: Vec<&str> = report.errors.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(
        rejected,
        vec!["every-minute", "mystery", "bad-cron", "bad-args", "hourly-stats"]
    );

    let entries = store.list_schedules().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].job, "generate_statistics");
}

#[tokio::test]
async fn test_fire_enqueues_and_records_bookkeeping() {
    let store = test_store().await;
    let queue = JobQueue::new(store.clone(), "default");

    sync_schedules(&store, &default_schedules(), apply()).await;

    let run_id = scheduler::fire(&store, &queue, "export-weather-data")
        .await
        .unwrap()
        .expect("enabled entry should enqueue");

    let run = queue.get(&run_id).await.unwrap().unwrap();
    assert_eq!(run.job, "export_data");
    assert_eq!(run.status, JobStatus::Pending);
    assert_eq!(run.args, json!({"format": "csv"}));
    assert_eq!(run.schedule_name.as_deref(), Some("export-weather-data"));

    let entry = store
        .get_schedule("export-weather-data")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.total_enqueued, 1);
    assert!(entry.last_enqueued_at.is_some());

    assert!(
        scheduler::fire(&store, &queue, "no-such-entry")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_disabled_and_expired_entries_do_not_fire() {
    let store = test_store().await;
    let queue = JobQueue::new(store.clone(), "default");

    let disabled = ScheduleDefinition {
        enabled: false,
        ..ScheduleDefinition::crontab("paused", "cleanup", CrontabFields::new("0", "2", "*"))
    };
    let expired = ScheduleDefinition {
        expires_seconds: Some(0),
        ..ScheduleDefinition::crontab("one-off", "cleanup", CrontabFields::new("0", "3", "*"))
    };
    let report = sync_schedules(&store, &[disabled, expired], apply()).await;
    assert_eq!(report.created, 2);

    assert!(scheduler::fire(&store, &queue, "paused").await.unwrap().is_none());
    assert!(scheduler::fire(&store, &queue, "one-off").await.unwrap().is_none());
    assert_eq!(queue.count(JobStatus::Pending).await.unwrap(), 0);

    let enabled = store.list_enabled_schedules().await.unwrap();
    assert_eq!(enabled.len(), 1);
    assert_eq!(enabled[0].name, "one-off");

    queue
        .enqueue_named("cleanup", &json!({}), EnqueueOptions::default())
        .await
        .unwrap();
    assert_eq!(queue.count(JobStatus::Pending).await.unwrap(), 1);
}

#[tokio::test]
async fn test_corrupt_schedule_args_do_not_fire_with_defaults() {
    use sea_orm::ConnectionTrait;

    let store = test_store().await;
    let queue = JobQueue::new(store.clone(), "default");
    sync_schedules(&store, &default_schedules(), apply()).await;

    store
        .conn
        .execute_unprepared(
            "UPDATE schedule_entries SET args = '{\"format\": ' WHERE name = 'export-weather-data'",
        )
        .await
        .unwrap();

    let err = scheduler::fire(&store, &queue, "export-weather-data")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("export-weather-data"), "{err}");
    assert_eq!(queue.count(JobStatus::Pending).await.unwrap(), 0);

    let enabled = store.list_enabled_schedules().await.unwrap();
    assert_eq!(enabled.len(), default_schedules().len() - 1);
    assert!(enabled.iter().all(|entry| entry.name != "export-weather-data"));
}
