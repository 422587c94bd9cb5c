//! NanoFactory CLI
//!
//! Command-line front end for the laser nanofabrication control library.
//!
//! # Usage
//!
//! ```bash
//! nanofactory draw job.yaml --output print.pgm
//! nanofactory run print.pgm --task --task-id 2
//! nanofactory status --tasks
//! nanofactory plane-fit points.csv --container plane.zdc
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use nanofactory::adapters::TomlConfigAdapter;
use nanofactory::app::container::{AppContainer, DefaultAppContainer};
use nanofactory::cli::{commands, Cli};
use nanofactory::config_initialization::initialize_configuration_hierarchy;
use nanofactory::ports::ConfigPort;
use nanofactory::utils::logging::LoggingSystem;

/// Main entry point for the NanoFactory CLI
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Arc::new(TomlConfigAdapter::new());
    initialize_configuration_hierarchy(config.as_ref(), &cli).await?;

    let container = DefaultAppContainer::new(config.clone() as Arc<dyn ConfigPort>)
        .await
        .context("Failed to initialize application")?;

    let logging = LoggingSystem::new(container.settings().logging.clone());
    logging
        .initialize()
        .context("Failed to initialize logging")?;
    logging.log_system_info();

    let result = commands::execute(cli.command, &container, config.as_ref()).await;
    match &result {
        Ok(()) => info!("NanoFactory completed successfully"),
        Err(e) => error!("{:#}", e),
    }
    result
}
