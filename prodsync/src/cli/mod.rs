//! Command-line interface

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::export::ExportArgs;
use commands::sync::PlanArgs;

#[derive(Debug, Parser)]
#[command(name = "prodsync")]
#[command(author, version, about = "Sync daily production counts into a Google spreadsheet", long_about = None)]
pub struct Cli {
    /// Load environment variables from this file instead of `.env`
    #[arg(long, global = true, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Sheet layout file (overrides SYNC_LAYOUT_FILE)
    #[arg(long, global = true, value_name = "PATH")]
    pub layout: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Sync now, then on schedule until interrupted (default)
    Run,
    /// Sync once and exit
    Once,
    /// Show what a sync would change without writing anything
    Plan(PlanArgs),
    /// Write the normalized records of the fetch window to an .xlsx file
    Export(ExportArgs),
}
