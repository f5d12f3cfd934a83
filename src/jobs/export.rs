use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::borrow::Cow;
use std::fmt::Write;
use std::str::FromStr;
use tracing::info;

use super::JobError;
use crate::config::JobsConfig;
use crate::db::{RecordFilter, RecordOrder, Store};
use crate::models::WeatherRecord;

pub const CSV_HEADER: &str =
    "City,Country,Temperature,Humidity,Wind Speed,Pressure,Description,Icon,Searched At";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }

    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Csv => "text/csv",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(JobError::InvalidInput(format!(
                "Unsupported export format: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub format: String,
    pub records_count: usize,
    pub exported_at: DateTime<Utc>,
    pub data_preview: String,
}

fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

/// Serializes records in the order given.
pub fn render_export(records: &[WeatherRecord], format: ExportFormat) -> Result<String, JobError> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(records)?),
        ExportFormat::Csv => {
            let mut csv = String::from(CSV_HEADER);
            csv.push('\n');
            for r in records {
                let _ = writeln!(
                    csv,
                    "{},{},{},{},{},{},{},{},{}",
                    csv_field(&r.city),
                    csv_field(r.country.as_deref().unwrap_or_default()),
                    r.temperature,
                    r.humidity,
                    r.wind_speed,
                    r.pressure,
                    csv_field(&r.description),
                    csv_field(&r.icon),
                    r.observed_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                );
            }
            Ok(csv)
        }
    }
}

/// Cuts `data` to `max_chars` characters, marking the cut with `...`.
#[must_use]
pub fn preview(data: &str, max_chars: usize) -> String {
    match data.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &data[..cut]),
        None => data.to_string(),
    }
}

pub async fn export_all(store: &Store, format: ExportFormat) -> Result<(String, usize), JobError> {
    let records = store
        .query_records(&RecordFilter::Any, RecordOrder::NewestFirst, None)
        .await?;
    let data = render_export(&records, format)?;
    Ok((data, records.len()))
}

pub async fn run(store: &Store, format: &str, config: &JobsConfig) -> Result<ExportReport, JobError> {
    let format: ExportFormat = format.parse()?;
    let (data, records_count) = export_all(store, format).await?;

    info!(records_count, format = format.as_str(), "Weather data exported");

    Ok(ExportReport {
        format: format.as_str().to_string(),
        records_count,
        exported_at: Utc::now(),
        data_preview: preview(&data, config.export_preview_chars),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(city: &str, description: &str) -> WeatherRecord {
        WeatherRecord {
            id: 1,
            city: city.to_string(),
            country: None,
            temperature: 12.5,
            humidity: 70,
            wind_speed: 3.0,
            pressure: 1008,
            description: description.to_string(),
            icon: "10d".to_string(),
            observed_at: Utc.with_ymd_and_hms(2026, 2, 3, 4, 5, 6).unwrap(),
        }
    }

    #[test]
    fn test_unsupported_format_is_invalid_input() {
        assert!(matches!(
            "xml".parse::<ExportFormat>(),
            Err(JobError::InvalidInput(_))
        ));
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
    }

    #[test]
    fn test_csv_header_and_quoting() {
        let csv = render_export(
            &[record("Washington, D.C.", "light \"rain\"")],
            ExportFormat::Csv,
        )
        .unwrap();
        let mut lines = csv.lines();

        assert_eq!(lines.next(), Some(CSV_HEADER));
        assert_eq!(
            lines.next(),
            Some(
                "\"Washington, D.C.\",,12.5,70,3,1008,\"light \"\"rain\"\"\",10d,2026-02-03T04:05:06Z"
            )
        );
    }

    #[test]
    fn test_json_is_array_of_records() {
        let json = render_export(&[record("Rome", "clear")], ExportFormat::Json).unwrap();
        let parsed: Vec<WeatherRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].city, "Rome");
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        assert_eq!(preview("short", 500), "short");
        assert_eq!(preview("ééééé", 3), "ééé...");
        assert_eq!(preview("abc", 3), "abc");
    }
}
