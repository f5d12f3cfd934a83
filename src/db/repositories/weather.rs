use crate::db::filter::{NumericField, RecordFilter};
use crate::entities::{prelude::*, weather_records};
use crate::models::{NewWeatherRecord, WeatherRecord};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseBackend, DatabaseConnection, EntityTrait, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Min(NumericField),
    Max(NumericField),
    Avg(NumericField),
    CountByCity,
    CountByDay,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityCount {
    pub city: String,
    pub country: Option<String>,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayCount {
    pub day: NaiveDate,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AggregateValue {
    /// `None` when a min/max/avg ran over no rows.
    Scalar(Option<f64>),
    ByCity(Vec<CityCount>),
    ByDay(Vec<DayCount>),
}

impl AggregateValue {
    #[must_use]
    pub const fn scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => *v,
            _ => None,
        }
    }
}

/// Records removed from one (city, UTC day) group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrimmedGroup {
    pub city: String,
    pub day: NaiveDate,
    pub removed: u64,
}

pub struct WeatherRepository {
    conn: DatabaseConnection,
}

impl WeatherRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn insert(&self, record: &NewWeatherRecord) -> Result<i64> {
        self.insert_at(record, Utc::now()).await
    }

    pub async fn insert_at(
        &self,
        record: &NewWeatherRecord,
        observed_at: DateTime<Utc>,
    ) -> Result<i64> {
        let active_model = weather_records::ActiveModel {
            city: Set(record.city.clone()),
            country: Set(record.country.clone().filter(|c| !c.is_empty())),
            temperature: Set(record.temperature),
            humidity: Set(record.humidity),
            wind_speed: Set(record.wind_speed),
            pressure: Set(record.pressure),
            description: Set(record.description.clone()),
            icon: Set(record.icon.clone()),
            observed_at: Set(observed_at),
            ..Default::default()
        };

        let res = WeatherRecords::insert(active_model)
            .exec(&self.conn)
            .await
            .context("Failed to insert weather record")?;
        Ok(res.last_insert_id)
    }

    pub async fn get(&self, id: i64) -> Result<Option<WeatherRecord>> {
        let row = WeatherRecords::find_by_id(id).one(&self.conn).await?;
        Ok(row.map(WeatherRecord::from))
    }

    pub async fn query(
        &self,
        filter: &RecordFilter,
        order: RecordOrder,
        limit: Option<u64>,
    ) -> Result<Vec<WeatherRecord>> {
        let direction = match order {
            RecordOrder::NewestFirst => Order::Desc,
            RecordOrder::OldestFirst => Order::Asc,
        };

        let rows = WeatherRecords::find()
            .filter(filter.to_condition())
            .order_by(weather_records::Column::ObservedAt, direction.clone())
            .order_by(weather_records::Column::Id, direction)
            .limit(limit)
            .all(&self.conn)
            .await?;

        Ok(rows.into_iter().map(WeatherRecord::from).collect())
    }

    pub async fn count(&self, filter: &RecordFilter) -> Result<u64> {
        let total = WeatherRecords::find()
            .filter(filter.to_condition())
            .count(&self.conn)
            .await?;
        Ok(total)
    }

    pub async fn aggregate(
        &self,
        filter: &RecordFilter,
        aggregate: Aggregate,
    ) -> Result<AggregateValue> {
        match aggregate {
            Aggregate::Count => {
                #[allow(clippy::cast_precision_loss)]
                let total = self.count(filter).await? as f64;
                Ok(AggregateValue::Scalar(Some(total)))
            }
            Aggregate::Min(field) => self.scalar(filter, "MIN", field).await,
            Aggregate::Max(field) => self.scalar(filter, "MAX", field).await,
            Aggregate::Avg(field) => self.scalar(filter, "AVG", field).await,
            Aggregate::CountByCity => {
                let rows: Vec<(String, Option<String>, i64, i64)> = WeatherRecords::find()
                    .select_only()
                    .column(weather_records::Column::City)
                    .column(weather_records::Column::Country)
                    .column_as(Expr::col(weather_records::Column::Id).count(), "total")
                    .column_as(Expr::col(weather_records::Column::Id).min(), "first_id")
                    .filter(filter.to_condition())
                    .group_by(weather_records::Column::City)
                    .group_by(weather_records::Column::Country)
                    .order_by(Expr::cust("total"), Order::Desc)
                    .order_by(Expr::cust("first_id"), Order::Asc)
                    .into_tuple()
                    .all(&self.conn)
                    .await?;

                Ok(AggregateValue::ByCity(
                    rows.into_iter()
                        .map(|(city, country, total, _)| CityCount {
                            city,
                            country,
                            count: u64::try_from(total).unwrap_or_default(),
                        })
                        .collect(),
                ))
            }
            Aggregate::CountByDay => {
                let rows: Vec<(String, i64)> = WeatherRecords::find()
                    .select_only()
                    .column_as(Expr::cust("date(observed_at)"), "day")
                    .column_as(Expr::col(weather_records::Column::Id).count(), "total")
                    .filter(filter.to_condition())
                    .group_by(Expr::cust("date(observed_at)"))
                    .order_by(Expr::cust("day"), Order::Asc)
                    .into_tuple()
                    .all(&self.conn)
                    .await?;

                let mut days = Vec::with_capacity(rows.len());
                for (day, total) in rows {
                    let day = NaiveDate::parse_from_str(&day, "%Y-%m-%d")
                        .with_context(|| format!("Unexpected day bucket '{day}'"))?;
                    days.push(DayCount {
                        day,
                        count: u64::try_from(total).unwrap_or_default(),
                    });
                }
                Ok(AggregateValue::ByDay(days))
            }
        }
    }

    async fn scalar(
        &self,
        filter: &RecordFilter,
        function: &str,
        field: NumericField,
    ) -> Result<AggregateValue> {
        // Integer columns come back as INTEGER from MIN/MAX; cast keeps decoding uniform.
        let expr = Expr::cust(format!(
            "CAST({function}({}) AS REAL)",
            field.column_name()
        ));

        let value: Option<Option<f64>> = WeatherRecords::find()
            .select_only()
            .column_as(expr, "value")
            .filter(filter.to_condition())
            .into_tuple()
            .one(&self.conn)
            .await?;

        Ok(AggregateValue::Scalar(value.flatten()))
    }

    pub async fn delete(&self, filter: &RecordFilter) -> Result<u64> {
        let res = WeatherRecords::delete_many()
            .filter(filter.to_condition())
            .exec(&self.conn)
            .await?;
        Ok(res.rows_affected)
    }

    /// Keeps the `keep` most recent records of every (city, UTC day) group
    /// that holds more than `threshold` records.
    ///
    /// Surplus ids are planned from a read snapshot and removed in a single
    /// `DELETE`; rows inserted after the snapshot are never touched.
    pub async fn trim_daily_duplicates(
        &self,
        threshold: usize,
        keep: usize,
    ) -> Result<Vec<TrimmedGroup>> {
        let rows: Vec<(i64, String, DateTime<Utc>)> = WeatherRecords::find()
            .select_only()
            .column(weather_records::Column::Id)
            .column(weather_records::Column::City)
            .column(weather_records::Column::ObservedAt)
            .order_by_desc(weather_records::Column::ObservedAt)
            .order_by_desc(weather_records::Column::Id)
            .into_tuple()
            .all(&self.conn)
            .await?;

        let mut groups: BTreeMap<(String, NaiveDate), Vec<i64>> = BTreeMap::new();
        for (id, city, observed_at) in rows {
            groups
                .entry((city, observed_at.date_naive()))
                .or_default()
                .push(id);
        }

        let mut trimmed = Vec::new();
        let mut surplus = Vec::new();
        for ((city, day), ids) in groups {
            if ids.len() <= threshold {
                continue;
            }
            let extra: Vec<i64> = ids.into_iter().skip(keep).collect();
            trimmed.push(TrimmedGroup {
                city,
                day,
                removed: extra.len() as u64,
            });
            surplus.extend(extra);
        }

        if surplus.is_empty() {
            return Ok(trimmed);
        }

        let planned = surplus.len() as u64;
        let res = WeatherRecords::delete_many()
            .filter(weather_records::Column::Id.is_in(surplus))
            .exec(&self.conn)
            .await
            .context("Failed to delete duplicate records")?;

        if res.rows_affected != planned {
            debug!(
                planned,
                removed = res.rows_affected,
                "Some duplicate records were already gone"
            );
        }
        for group in &trimmed {
            debug!(city = %group.city, day = %group.day, removed = group.removed, "Trimmed duplicate records");
        }

        Ok(trimmed)
    }

    pub fn supports_analyze(&self) -> bool {
        matches!(
            self.conn.get_database_backend(),
            DatabaseBackend::Sqlite | DatabaseBackend::Postgres
        )
    }

    pub async fn analyze(&self) -> Result<()> {
        self.conn
            .execute_unprepared("ANALYZE")
            .await
            .context("ANALYZE failed")?;
        Ok(())
    }
}
