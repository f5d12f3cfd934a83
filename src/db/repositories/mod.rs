pub mod job_run;
pub mod schedule;
pub mod weather;
