//! Configuration initialization and hierarchy management

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::{Cli, Commands};
use crate::ports::ConfigPort;

/// Settings files tried in order when `--config` is not given
pub const CONFIG_PATHS: &[&str] = &["nanofactory.toml", "config/nanofactory.toml"];

/// Environment variables and the settings they override
pub const ENV_MAPPINGS: &[(&str, &str)] = &[
    ("NANOFACTORY_LOG_LEVEL", "log_level"),
    ("NANOFACTORY_LOG_FORMAT", "log_format"),
    ("NANOFACTORY_LOG_FILE", "log_file"),
    ("NANOFACTORY_CONTROLLER_HOST", "controller_host"),
    ("NANOFACTORY_CONTROLLER_PORT", "controller_port"),
    ("NANOFACTORY_CONTROLLER_DUMMY", "controller_dummy"),
    ("NANOFACTORY_RESPONSE_TIMEOUT_MS", "response_timeout_ms"),
    ("NANOFACTORY_SYSTEM_CONFIG", "system_config"),
    ("NANOFACTORY_PROGRAM_DIR", "program_dir"),
    ("NANOFACTORY_DEFAULT_TASK", "default_task"),
    ("NANOFACTORY_READY_TIMEOUT_S", "ready_timeout_s"),
    ("NANOFACTORY_START_TIMEOUT_S", "start_timeout_s"),
    ("NANOFACTORY_POLL_INTERVAL_MS", "poll_interval_ms"),
];

/// Initialize configuration hierarchy following precedence: CLI > Env > File > Defaults
pub async fn initialize_configuration_hierarchy(config: &dyn ConfigPort, cli: &Cli) -> Result<()> {
    // Defaults are loaded when the adapter is created
    load_config_file(config, cli.config.as_deref()).await?;
    load_environment_variables(config).await?;
    apply_cli_configuration_overrides(config, cli).await?;

    config
        .validate_config()
        .await
        .context("Invalid configuration")?;
    debug!("Configuration hierarchy initialized");
    Ok(())
}

/// Load the explicit settings file or the first one found
async fn load_config_file(config: &dyn ConfigPort, explicit: Option<&Path>) -> Result<()> {
    if let Some(path) = explicit {
        let path_text = path.to_string_lossy();
        return config
            .load_config(&path_text)
            .await
            .with_context(|| format!("Failed to load configuration {}", path.display()));
    }

    for path in CONFIG_PATHS {
        if Path::new(path).exists() {
            info!("Loading configuration from: {}", path);
            config
                .load_config(path)
                .await
                .with_context(|| format!("Failed to load configuration {}", path))?;
            return Ok(());
        }
    }
    debug!("No configuration file found, using defaults");
    Ok(())
}

/// Apply environment variables to the configuration
async fn load_environment_variables(config: &dyn ConfigPort) -> Result<()> {
    let mut env_overrides = 0;
    for (env_var, config_key) in ENV_MAPPINGS {
        if let Ok(value) = std::env::var(env_var) {
            debug!("Found environment override: {} = {}", env_var, value);
            config.set_config(config_key, &value).await?;
            env_overrides += 1;
        }
    }

    if env_overrides > 0 {
        info!("Applied {} environment variable overrides", env_overrides);
    }
    Ok(())
}

/// Apply CLI argument overrides to configuration
async fn apply_cli_configuration_overrides(config: &dyn ConfigPort, cli: &Cli) -> Result<()> {
    let mut overrides: Vec<(&str, String)> = Vec::new();
    if let Some(level) = &cli.log_level {
        overrides.push(("log_level", level.clone()));
    }
    if let Some(format) = &cli.log_format {
        overrides.push(("log_format", format.clone()));
    }
    if let Some(file) = &cli.log_file {
        overrides.push(("log_file", file.to_string_lossy().to_string()));
    }
    if cli.dummy {
        overrides.push(("controller_dummy", "true".to_string()));
    }
    if let Commands::Run(args) = &cli.command {
        if let Some(task) = args.task_id {
            overrides.push(("default_task", task.to_string()));
        }
    }

    for (key, value) in &overrides {
        debug!("CLI override: {} = {}", key, value);
        config.set_config(key, value).await?;
    }
    if !overrides.is_empty() {
        info!("Applied {} CLI configuration overrides", overrides.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::TomlConfigAdapter;
    use clap::Parser;

    #[tokio::test]
    async fn test_cli_beats_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("settings.toml");
        std::fs::write(
            &file,
            "[nanofactory]\nlog_level = \"warn\"\ncontroller_host = \"10.0.0.7\"\n",
        )
        .unwrap();

        let cli = Cli::parse_from([
            "nanofactory",
            "--config",
            file.to_str().unwrap(),
            "--log-level",
            "debug",
            "--dummy",
            "status",
        ]);
        let config = TomlConfigAdapter::new();
        initialize_configuration_hierarchy(&config, &cli).await.unwrap();

        assert_eq!(config.get_config("log_level").await.unwrap().as_deref(), Some("debug"));
        assert_eq!(
            config.get_config("controller_host").await.unwrap().as_deref(),
            Some("10.0.0.7")
        );
        assert_eq!(
            config.get_config("controller_dummy").await.unwrap().as_deref(),
            Some("true")
        );
    }

    #[tokio::test]
    async fn test_missing_explicit_file_fails() {
        let cli = Cli::parse_from(["nanofactory", "--config", "/nonexistent/nf.toml", "info"]);
        let config = TomlConfigAdapter::new();
        assert!(initialize_configuration_hierarchy(&config, &cli).await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_cli_value_fails_validation() {
        let cli = Cli::parse_from(["nanofactory", "--log-format", "xml", "info"]);
        let config = TomlConfigAdapter::new();
        assert!(initialize_configuration_hierarchy(&config, &cli).await.is_err());
    }
}
