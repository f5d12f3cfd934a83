pub mod prelude;

pub mod job_runs;
pub mod schedule_entries;
pub mod weather_records;
