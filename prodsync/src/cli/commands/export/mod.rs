//! `export`: snapshot of the normalized source data as .xlsx

pub mod handler;

use chrono::NaiveDate;
use clap::Args;
use std::path::PathBuf;

pub use handler::handle_export_command;

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Output workbook path
    #[arg(short, long, default_value = "prodsync-export.xlsx")]
    pub output: PathBuf,

    /// Export the fetch window around this date instead of today (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub today: Option<NaiveDate>,
}
