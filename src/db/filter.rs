use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, LikeExpr};
use sea_orm::{ColumnTrait, Condition};

use crate::entities::weather_records::Column;
use crate::models::WeatherRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericField {
    Temperature,
    Humidity,
    WindSpeed,
    Pressure,
}

impl NumericField {
    pub(crate) const fn column(self) -> Column {
        match self {
            Self::Temperature => Column::Temperature,
            Self::Humidity => Column::Humidity,
            Self::WindSpeed => Column::WindSpeed,
            Self::Pressure => Column::Pressure,
        }
    }

    pub(crate) const fn column_name(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::WindSpeed => "wind_speed",
            Self::Pressure => "pressure",
        }
    }

    #[must_use]
    pub fn value_of(self, record: &WeatherRecord) -> f64 {
        match self {
            Self::Temperature => record.temperature,
            Self::Humidity => f64::from(record.humidity),
            Self::WindSpeed => record.wind_speed,
            Self::Pressure => f64::from(record.pressure),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
}

impl Comparison {
    fn holds(self, left: f64, right: f64) -> bool {
        match self {
            Self::Lt => left < right,
            Self::Lte => left <= right,
            Self::Gt => left > right,
            Self::Gte => left >= right,
            Self::Eq => (left - right).abs() < f64::EPSILON,
        }
    }
}

/// Predicate over weather records.
///
/// Translates to a SQL condition for the store and can also be evaluated
/// against a record in memory; both paths give the same answer.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RecordFilter {
    #[default]
    Any,
    City(String),
    /// Case-insensitive (ASCII) substring match on the city name.
    CityContains(String),
    ObservedBefore(DateTime<Utc>),
    ObservedSince(DateTime<Utc>),
    Compare(NumericField, Comparison, f64),
    Ids(Vec<i64>),
    /// Empty conjunction matches every record.
    And(Vec<RecordFilter>),
    /// Empty disjunction matches nothing.
    Or(Vec<RecordFilter>),
}

/// Escapes LIKE wildcards so the fragment matches literally.
fn escape_like(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len());
    for c in fragment.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn never() -> Condition {
    Condition::all().add(Expr::val(1).eq(0))
}

impl RecordFilter {
    #[must_use]
    pub fn to_condition(&self) -> Condition {
        match self {
            Self::Any => Condition::all(),
            Self::City(city) => Condition::all().add(Column::City.eq(city.as_str())),
            Self::CityContains(fragment) => Condition::all().add(
                Expr::col(Column::City)
                    .like(LikeExpr::new(format!("%{}%", escape_like(fragment))).escape('\\')),
            ),
            Self::ObservedBefore(at) => Condition::all().add(Column::ObservedAt.lt(*at)),
            Self::ObservedSince(at) => Condition::all().add(Column::ObservedAt.gte(*at)),
            Self::Compare(field, op, value) => {
                let column = field.column();
                let expr = match op {
                    Comparison::Lt => column.lt(*value),
                    Comparison::Lte => column.lte(*value),
                    Comparison::Gt => column.gt(*value),
                    Comparison::Gte => column.gte(*value),
                    Comparison::Eq => column.eq(*value),
                };
                Condition::all().add(expr)
            }
            Self::Ids(ids) if ids.is_empty() => never(),
            Self::Ids(ids) => Condition::all().add(Column::Id.is_in(ids.iter().copied())),
            Self::And(parts) => parts
                .iter()
                .fold(Condition::all(), |cond, part| cond.add(part.to_condition())),
            Self::Or(parts) if parts.is_empty() => never(),
            Self::Or(parts) => parts
                .iter()
                .fold(Condition::any(), |cond, part| cond.add(part.to_condition())),
        }
    }

    #[must_use]
    pub fn matches(&self, record: &WeatherRecord) -> bool {
        match self {
            Self::Any => true,
            Self::City(city) => record.city == *city,
            Self::CityContains(fragment) => record
                .city
                .to_ascii_lowercase()
                .contains(&fragment.to_ascii_lowercase()),
            Self::ObservedBefore(at) => record.observed_at < *at,
            Self::ObservedSince(at) => record.observed_at >= *at,
            Self::Compare(field, op, value) => op.holds(field.value_of(record), *value),
            Self::Ids(ids) => ids.contains(&record.id),
            Self::And(parts) => parts.iter().all(|p| p.matches(record)),
            Self::Or(parts) => parts.iter().any(|p| p.matches(record)),
        }
    }
}
