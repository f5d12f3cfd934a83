use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::info;

use super::JobError;
use crate::config::JobsConfig;
use crate::db::{Aggregate, AggregateValue, CityCount, DayCount, NumericField, RecordFilter, Store};

#[derive(Debug, Clone, Serialize)]
pub struct TemperatureStats {
    pub min: Option<f64>,
    pub avg: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatisticsReport {
    pub total_searches: u64,
    pub top_cities: Vec<CityCount>,
    pub temperature_stats: TemperatureStats,
    pub daily_searches: Vec<DayCount>,
    pub generated_at: DateTime<Utc>,
}

pub async fn run(store: &Store, config: &JobsConfig) -> Result<StatisticsReport, JobError> {
    let all = RecordFilter::Any;
    let total_searches = store.count_records(&all).await?;

    let mut top_cities = match store.aggregate_records(&all, Aggregate::CountByCity).await? {
        AggregateValue::ByCity(rows) => rows,
        _ => Vec::new(),
    };
    top_cities.truncate(config.top_cities);

    let temperature_stats = TemperatureStats {
        min: store
            .aggregate_records(&all, Aggregate::Min(NumericField::Temperature))
            .await?
            .scalar(),
        avg: store
            .aggregate_records(&all, Aggregate::Avg(NumericField::Temperature))
            .await?
            .scalar(),
        max: store
            .aggregate_records(&all, Aggregate::Max(NumericField::Temperature))
            .await?
            .scalar(),
    };

    let since = Utc::now() - Duration::days(config.statistics_days);
    let daily_searches = match store
        .aggregate_records(&RecordFilter::ObservedSince(since), Aggregate::CountByDay)
        .await?
    {
        AggregateValue::ByDay(days) => days,
        _ => Vec::new(),
    };

    info!(total_searches, "Weather statistics generated");

    Ok(StatisticsReport {
        total_searches,
        top_cities,
        temperature_stats,
        daily_searches,
        generated_at: Utc::now(),
    })
}
