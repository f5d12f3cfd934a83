use crate::models::{JobRun, JobStatus, NewWeatherRecord, ScheduleEntry, WeatherRecord};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod filter;
pub mod migrator;
pub mod repositories;

pub use filter::{Comparison, NumericField, RecordFilter};
pub use repositories::job_run::NewJobRun;
pub use repositories::schedule::ScheduleEntryInput;
pub use repositories::weather::{
    Aggregate, AggregateValue, CityCount, DayCount, RecordOrder, TrimmedGroup,
};

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        // Every pooled connection to `:memory:` would be its own database.
        let in_memory = db_url.contains(":memory:");
        let (max_connections, min_connections) = if in_memory {
            (1, 1)
        } else {
            (max_connections, min_connections)
        };

        if !in_memory {
            let path_str = db_url
                .trim_start_matches("sqlite://")
                .trim_start_matches("sqlite:");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent()
                && !parent.as_os_str().is_empty()
            {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn weather_repo(&self) -> repositories::weather::WeatherRepository {
        repositories::weather::WeatherRepository::new(self.conn.clone())
    }

    fn schedule_repo(&self) -> repositories::schedule::ScheduleRepository {
        repositories::schedule::ScheduleRepository::new(self.conn.clone())
    }

    fn job_run_repo(&self) -> repositories::job_run::JobRunRepository {
        repositories::job_run::JobRunRepository::new(self.conn.clone())
    }

    // ========================================================================
    // Weather records
    // ========================================================================

    pub async fn insert_record(&self, record: &NewWeatherRecord) -> Result<i64> {
        self.weather_repo().insert(record).await
    }

    pub async fn insert_record_at(
        &self,
        record: &NewWeatherRecord,
        observed_at: DateTime<Utc>,
    ) -> Result<i64> {
        self.weather_repo().insert_at(record, observed_at).await
    }

    pub async fn get_record(&self, id: i64) -> Result<Option<WeatherRecord>> {
        self.weather_repo().get(id).await
    }

    pub async fn query_records(
        &self,
        filter: &RecordFilter,
        order: RecordOrder,
        limit: Option<u64>,
    ) -> Result<Vec<WeatherRecord>> {
        self.weather_repo().query(filter, order, limit).await
    }

    pub async fn count_records(&self, filter: &RecordFilter) -> Result<u64> {
        self.weather_repo().count(filter).await
    }

    pub async fn aggregate_records(
        &self,
        filter: &RecordFilter,
        aggregate: Aggregate,
    ) -> Result<AggregateValue> {
        self.weather_repo().aggregate(filter, aggregate).await
    }

    pub async fn delete_records(&self, filter: &RecordFilter) -> Result<u64> {
        self.weather_repo().delete(filter).await
    }

    pub async fn trim_daily_duplicates(
        &self,
        threshold: usize,
        keep: usize,
    ) -> Result<Vec<TrimmedGroup>> {
        self.weather_repo()
            .trim_daily_duplicates(threshold, keep)
            .await
    }

    pub fn supports_analyze(&self) -> bool {
        self.weather_repo().supports_analyze()
    }

    pub async fn analyze(&self) -> Result<()> {
        self.weather_repo().analyze().await
    }

    // ========================================================================
    // Schedule entries
    // ========================================================================

    pub async fn get_schedule(&self, name: &str) -> Result<Option<ScheduleEntry>> {
        self.schedule_repo().get_by_name(name).await
    }

    pub async fn create_schedule(&self, input: &ScheduleEntryInput) -> Result<i32> {
        self.schedule_repo().create(input).await
    }

    pub async fn update_schedule(&self, id: i32, input: &ScheduleEntryInput) -> Result<()> {
        self.schedule_repo().update(id, input).await
    }

    pub async fn list_schedules(&self) -> Result<Vec<ScheduleEntry>> {
        self.schedule_repo().list().await
    }

    pub async fn list_enabled_schedules(&self) -> Result<Vec<ScheduleEntry>> {
        self.schedule_repo().list_enabled().await
    }

    pub async fn record_schedule_enqueued(&self, name: &str, at: DateTime<Utc>) -> Result<()> {
        self.schedule_repo().record_enqueued(name, at).await
    }

    // ========================================================================
    // Job runs
    // ========================================================================

    pub async fn insert_job_run(&self, run: &NewJobRun) -> Result<()> {
        self.job_run_repo().insert(run).await
    }

    pub async fn get_job_run(&self, id: &str) -> Result<Option<JobRun>> {
        self.job_run_repo().get(id).await
    }

    pub async fn list_job_runs(&self, limit: u64) -> Result<Vec<JobRun>> {
        self.job_run_repo().list(limit).await
    }

    pub async fn count_job_runs(&self, status: JobStatus) -> Result<u64> {
        self.job_run_repo().count_by_status(status).await
    }

    pub async fn claim_next_job_run(&self, now: DateTime<Utc>) -> Result<Option<JobRun>> {
        self.job_run_repo().claim_next(now).await
    }

    pub async fn cancel_job_run(&self, id: &str) -> Result<bool> {
        self.job_run_repo().cancel(id).await
    }

    pub async fn update_job_progress(&self, id: &str, current: u32, total: u32) -> Result<bool> {
        self.job_run_repo()
            .update_progress(id, current, total)
            .await
    }

    pub async fn complete_job_run(&self, id: &str, result: &serde_json::Value) -> Result<bool> {
        self.job_run_repo().complete(id, result).await
    }

    pub async fn fail_job_run(&self, id: &str, error: &str) -> Result<bool> {
        self.job_run_repo().fail(id, error).await
    }

    pub async fn recover_interrupted_job_runs(&self) -> Result<u64> {
        self.job_run_repo().recover_interrupted().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    async fn test_store() -> Store {
        Store::new("sqlite::memory:").await.unwrap()
    }

    fn sample(city: &str, temperature: f64) -> NewWeatherRecord {
        NewWeatherRecord {
            city: city.to_string(),
            country: Some("FR".to_string()),
            temperature,
            humidity: 50,
            wind_speed: 2.0,
            pressure: 1013,
            description: "clear sky".to_string(),
            icon: "01d".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_increasing_ids() {
        let store = test_store().await;
        let first = store.insert_record(&sample("Paris", 20.0)).await.unwrap();
        let second = store.insert_record(&sample("Paris", 21.0)).await.unwrap();
        assert!(second > first);

        let fetched = store.get_record(first).await.unwrap().unwrap();
        assert_eq!(fetched.city, "Paris");
        assert!(store.get_record(second + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_country_stored_as_absent() {
        let store = test_store().await;
        let mut record = sample("Atlantis", 15.0);
        record.country = Some(String::new());
        let id = store.insert_record(&record).await.unwrap();
        assert_eq!(store.get_record(id).await.unwrap().unwrap().country, None);
    }

    #[tokio::test]
    async fn test_scalar_aggregates_on_empty_store() {
        let store = test_store().await;
        let min = store
            .aggregate_records(&RecordFilter::Any, Aggregate::Min(NumericField::Temperature))
            .await
            .unwrap();
        assert_eq!(min, AggregateValue::Scalar(None));

        let count = store
            .aggregate_records(&RecordFilter::Any, Aggregate::Count)
            .await
            .unwrap();
        assert_eq!(count.scalar(), Some(0.0));
    }

    #[tokio::test]
    async fn test_scalar_aggregates() {
        let store = test_store().await;
        for t in [10.0, 20.0, 30.0] {
            store.insert_record(&sample("Lyon", t)).await.unwrap();
        }

        let agg = |a| {
            let store = store.clone();
            async move {
                store
                    .aggregate_records(&RecordFilter::Any, a)
                    .await
                    .unwrap()
                    .scalar()
            }
        };
        assert_eq!(agg(Aggregate::Min(NumericField::Temperature)).await, Some(10.0));
        assert_eq!(agg(Aggregate::Max(NumericField::Temperature)).await, Some(30.0));
        assert_eq!(agg(Aggregate::Avg(NumericField::Temperature)).await, Some(20.0));
        assert_eq!(agg(Aggregate::Max(NumericField::Humidity)).await, Some(50.0));
    }

    #[tokio::test]
    async fn test_count_by_city_orders_ties_by_first_seen() {
        let store = test_store().await;
        for city in ["Berlin", "Rome", "Rome", "Berlin", "Oslo"] {
            store.insert_record(&sample(city, 12.0)).await.unwrap();
        }

        let AggregateValue::ByCity(rows) = store
            .aggregate_records(&RecordFilter::Any, Aggregate::CountByCity)
            .await
            .unwrap()
        else {
            panic!("expected city grouping");
        };

        let names: Vec<_> = rows.iter().map(|r| (r.city.as_str(), r.count)).collect();
        assert_eq!(names, vec![("Berlin", 2), ("Rome", 2), ("Oslo", 1)]);
    }

    #[tokio::test]
    async fn test_count_by_day_is_ascending() {
        let store = test_store().await;
        let day_one = Utc.with_ymd_and_hms(2026, 3, 1, 23, 30, 0).unwrap();
        let day_two = day_one + Duration::hours(1);

        store.insert_record_at(&sample("Paris", 5.0), day_two).await.unwrap();
        store.insert_record_at(&sample("Paris", 5.0), day_one).await.unwrap();
        store.insert_record_at(&sample("Paris", 5.0), day_two).await.unwrap();

        let AggregateValue::ByDay(days) = store
            .aggregate_records(&RecordFilter::Any, Aggregate::CountByDay)
            .await
            .unwrap()
        else {
            panic!("expected day grouping");
        };

        assert_eq!(days.len(), 2);
        assert_eq!(days[0].day, day_one.date_naive());
        assert_eq!(days[0].count, 1);
        assert_eq!(days[1].count, 2);
    }

    #[tokio::test]
    async fn test_query_order_and_filters_agree_with_matches() {
        let store = test_store().await;
        let base = Utc.with_ymd_and_hms(2026, 5, 10, 12, 0, 0).unwrap();
        for (i, (city, t)) in [("Paris", 41.0), ("Oslo", -12.0), ("Paris", 18.0), ("Cairo", 39.0)]
            .into_iter()
            .enumerate()
        {
            store
                .insert_record_at(&sample(city, t), base + Duration::minutes(i as i64))
                .await
                .unwrap();
        }

        let filter = RecordFilter::And(vec![
            RecordFilter::ObservedSince(base),
            RecordFilter::Or(vec![
                RecordFilter::Compare(NumericField::Temperature, Comparison::Gte, 40.0),
                RecordFilter::Compare(NumericField::Temperature, Comparison::Lte, -10.0),
            ]),
        ]);

        let all = store
            .query_records(&RecordFilter::Any, RecordOrder::NewestFirst, None)
            .await
            .unwrap();
        assert_eq!(all[0].city, "Cairo");

        let selected = store
            .query_records(&filter, RecordOrder::OldestFirst, None)
            .await
            .unwrap();
        let expected: Vec<_> = all.iter().rev().filter(|r| filter.matches(r)).cloned().collect();
        assert_eq!(selected, expected);
        assert_eq!(selected.len(), 2);

        assert_eq!(store.count_records(&RecordFilter::Or(vec![])).await.unwrap(), 0);
        assert_eq!(store.count_records(&RecordFilter::And(vec![])).await.unwrap(), 4);

        store
            .insert_record_at(&sample("Rome", 22.0), base + Duration::minutes(5))
            .await
            .unwrap();
        let all = store
            .query_records(&RecordFilter::Any, RecordOrder::NewestFirst, None)
            .await
            .unwrap();
        for fragment in ["%", "_", "R_me", "\\", "par", "ROME"] {
            let filter = RecordFilter::CityContains(fragment.to_string());
            let in_memory = all.iter().filter(|r| filter.matches(r)).count() as u64;
            assert_eq!(
                store.count_records(&filter).await.unwrap(),
                in_memory,
                "fragment {fragment:?}"
            );
        }
        assert_eq!(
            store
                .count_records(&RecordFilter::CityContains("%".to_string()))
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_trim_daily_duplicates_keeps_most_recent() {
        let store = test_store().await;
        let base = Utc.with_ymd_and_hms(2026, 4, 2, 8, 0, 0).unwrap();

        let mut ids = Vec::new();
        for i in 0..7 {
            let id = store
                .insert_record_at(&sample("Paris", 10.0), base + Duration::minutes(i))
                .await
                .unwrap();
            ids.push(id);
        }
        for i in 0..4 {
            store
                .insert_record_at(&sample("Lima", 10.0), base + Duration::minutes(i))
                .await
                .unwrap();
        }

        let trimmed = store.trim_daily_duplicates(5, 3).await.unwrap();
        assert_eq!(trimmed.len(), 1);
        assert_eq!(trimmed[0].city, "Paris");
        assert_eq!(trimmed[0].removed, 4);

        let paris = store
            .query_records(
                &RecordFilter::City("Paris".to_string()),
                RecordOrder::NewestFirst,
                None,
            )
            .await
            .unwrap();
        let kept: Vec<i64> = paris.iter().map(|r| r.id).collect();
        assert_eq!(kept, vec![ids[6], ids[5], ids[4]]);
        assert_eq!(
            store
                .count_records(&RecordFilter::City("Lima".to_string()))
                .await
                .unwrap(),
            4
        );
    }

    #[tokio::test]
    async fn test_job_run_lifecycle() {
        let store = test_store().await;
        let run = NewJobRun {
            id: "run-1".to_string(),
            job: "cleanup".to_string(),
            args: serde_json::json!({}),
            queue: None,
            schedule_name: None,
            expires_at: None,
        };
        store.insert_job_run(&run).await.unwrap();

        let claimed = store.claim_next_job_run(Utc::now()).await.unwrap().unwrap();
        assert_eq!(claimed.status, JobStatus::Running);
        assert!(store.claim_next_job_run(Utc::now()).await.unwrap().is_none());
        assert!(!store.cancel_job_run("run-1").await.unwrap());

        assert!(store.update_job_progress("run-1", 2, 3).await.unwrap());
        assert!(!store.update_job_progress("run-1", 1, 3).await.unwrap());

        assert!(
            store
                .complete_job_run("run-1", &serde_json::json!({"ok": true}))
                .await
                .unwrap()
        );
        let done = store.get_job_run("run-1").await.unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Succeeded);
        assert_eq!(done.progress.map(|p| p.current), Some(2));
    }

    #[tokio::test]
    async fn test_expired_pending_run_is_failed_not_claimed() {
        let store = test_store().await;
        store
            .insert_job_run(&NewJobRun {
                id: "stale".to_string(),
                job: "send_alerts".to_string(),
                args: serde_json::json!({}),
                queue: None,
                schedule_name: Some("send-weather-alerts".to_string()),
                expires_at: Some(Utc::now() - Duration::seconds(5)),
            })
            .await
            .unwrap();

        assert!(store.claim_next_job_run(Utc::now()).await.unwrap().is_none());
        let run = store.get_job_run("stale").await.unwrap().unwrap();
        assert_eq!(run.status, JobStatus::Failed);
        assert_eq!(run.error.as_deref(), Some("expired"));
    }
}
