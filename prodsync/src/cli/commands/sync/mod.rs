//! `run`, `once` and `plan`

pub mod handler;

use chrono::NaiveDate;
use clap::Args;

pub use handler::{handle_once_command, handle_plan_command, handle_run_command};

#[derive(Debug, Args)]
pub struct PlanArgs {
    /// Plan as if today were this date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub today: Option<NaiveDate>,

    /// List every planned write, not just the summary
    #[arg(short, long)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}
