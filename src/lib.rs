pub mod camera;
mod cli;
mod commands;
pub mod gate;
pub mod lights;
pub mod models;
pub mod settings;
pub mod station;
pub mod uplink;
mod utils;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Command};
use settings::Settings;
use utils::logging;

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging (RUST_LOG wins over the debug switch)
    logging::init(cli.debug || logging::debug_from_env());

    let settings_path = Settings::resolve_path(cli.config.clone())?;
    let mut settings = Settings::load(&settings_path)?;
    cli.apply_overrides(&mut settings);
    log::debug!("settings loaded from {}", settings_path.display());

    let command = cli.command.clone().unwrap_or_default();
    if let Command::Config {
        write_default,
        force,
    } = command
    {
        return commands::show_or_write_config(&settings, &settings_path, write_default, force);
    }

    log::info!("redlight starting up...");

    // One thread of control: hardware handles are never shared across threads.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(async move {
        match command {
            Command::Run { trigger } => commands::run_station(&settings, trigger).await,
            Command::Blink => commands::blink(&settings).await,
            Command::Capture { report } => commands::capture_once(&settings, report).await,
            Command::Locate => commands::locate(&settings).await,
            Command::Config { .. } => Ok(()),
        }
    })
}
