pub mod job;
pub mod schedule;
pub mod weather;

pub use job::{JobRun, JobStatus, Progress};
pub use schedule::{Cadence, CrontabFields, ScheduleDefinition, ScheduleEntry};
pub use weather::{CityQuery, ForecastData, ForecastEntry, NewWeatherRecord, WeatherRecord};
