pub use super::job_runs::Entity as JobRuns;
pub use super::schedule_entries::Entity as ScheduleEntries;
pub use super::weather_records::Entity as WeatherRecords;
