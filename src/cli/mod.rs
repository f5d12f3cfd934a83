//! CLI module - Command-line interface for meteod
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand, ValueEnum};

/// meteod - weather lookup service with scheduled maintenance jobs
#[derive(Parser)]
#[command(name = "meteod")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API, worker pool and scheduler
    Daemon,

    /// Fetch current weather for a city and store it
    #[command(alias = "w")]
    Lookup {
        /// City name
        #[arg(required = true)]
        city: Vec<String>,
        /// ISO country code
        #[arg(long)]
        country: Option<String>,
    },

    /// Show recent lookups, newest first
    #[command(alias = "h")]
    History {
        /// Number of entries to show
        #[arg(default_value = "10")]
        limit: u64,
    },

    /// Run a job in the foreground, or queue it with --enqueue
    RunJob {
        /// Job name, e.g. cleanup or bulk_update
        job: String,
        /// JSON argument object
        #[arg(long)]
        args: Option<String>,
        /// Queue the job for the worker pool instead of running it here
        #[arg(long)]
        enqueue: bool,
    },

    /// Inspect or cancel queued job runs
    Jobs {
        #[command(subcommand)]
        command: JobCommands,
    },

    /// Write the configured schedules to the database
    SyncSchedules {
        /// Overwrite entries that already exist
        #[arg(long)]
        replace: bool,
        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Export all stored records
    Export {
        #[arg(long, value_enum, default_value = "json")]
        format: ExportFormatArg,
        /// Output file; stdout when omitted
        #[arg(long, short)]
        output: Option<std::path::PathBuf>,
    },

    /// Create default config file
    Init,
}

#[derive(Subcommand)]
pub enum JobCommands {
    /// List recent job runs
    #[command(alias = "ls")]
    List {
        #[arg(default_value = "20")]
        limit: u64,
    },
    /// Show one job run
    Show { id: String },
    /// Cancel a pending job run
    Cancel { id: String },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ExportFormatArg {
    Json,
    Csv,
}

impl From<ExportFormatArg> for crate::jobs::ExportFormat {
    fn from(arg: ExportFormatArg) -> Self {
        match arg {
            ExportFormatArg::Json => Self::Json,
            ExportFormatArg::Csv => Self::Csv,
        }
    }
}

pub use commands::*;
