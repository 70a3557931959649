//! prodsync: daily production counts from SQL into a Google spreadsheet

mod api;
mod cli;
mod config;
mod scheduler;
mod source;
mod sync;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};

use cli::commands::{export, sync as sync_cmd};
use cli::{Cli, Commands};
use config::{Config, SheetLayout};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.env_file {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("Failed to load env file {}", path.display()))?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let mut config = Config::from_env().context("Invalid configuration")?;
    if cli.layout.is_some() {
        config.layout_file = cli.layout.clone();
    }
    let layout = SheetLayout::load(config.layout_file.as_deref())?;
    debug!("Loaded configuration: {:?}", config.source.describe());

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            info!(
                "prodsync {} syncing '{}' / '{}'",
                env!("CARGO_PKG_VERSION"),
                config.sheet.spreadsheet_name,
                config.sheet.worksheet_name
            );
            sync_cmd::handle_run_command(&config, &layout).await
        }
        Commands::Once => sync_cmd::handle_once_command(&config, &layout).await,
        Commands::Plan(args) => sync_cmd::handle_plan_command(args, &config, &layout).await,
        Commands::Export(args) => export::handle_export_command(args, &config, &layout).await,
    }
}
