pub mod cli;
pub mod core;
pub mod providers;
pub mod refresher;
pub mod service;

pub use crate::core::config::AppConfig;
pub use crate::core::{ConversionEngine, ConversionError, RateCache};
pub use crate::refresher::{CycleReport, Refresher};
pub use crate::service::RatesService;

use anyhow::Result;
use tracing::{debug, info};

pub enum AppCommand {
    Convert {
        from: String,
        to: String,
        value: f64,
        json: bool,
    },
    Rates {
        json: bool,
    },
    Watch,
}

/// Loads the config from `config_path`, or from the default locations when `None`.
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");
    Ok(config)
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("xrate starting...");
    let config = load_config(config_path)?;

    match command {
        AppCommand::Convert {
            from,
            to,
            value,
            json,
        } => cli::convert::run(&config, &from, &to, value, json).await,
        AppCommand::Rates { json } => cli::rates::run(&config, json).await,
        AppCommand::Watch => cli::watch::run(&config).await,
    }
}
