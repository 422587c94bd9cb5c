// TOML config adapter - Application settings stored in TOML files

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::domain::constants::MAX_NUMBER_OF_TASKS;
use crate::domain::errors::DomainError;
use crate::ports::ConfigPort;
use crate::utils::logging::{LogFormat, LogLevel};

/// Table holding the settings in a config file
pub const CONFIG_TABLE: &str = "nanofactory";

/// Every known setting with its default value
pub const DEFAULTS: &[(&str, &str)] = &[
    ("log_level", "info"),
    ("log_format", "text"),
    ("log_file", ""),
    ("controller_host", "127.0.0.1"),
    ("controller_port", "8000"),
    ("controller_dummy", "false"),
    ("response_timeout_ms", "5000"),
    ("system_config", ""),
    ("program_dir", "programs"),
    ("default_task", "2"),
    ("ready_timeout_s", "10"),
    ("start_timeout_s", "10"),
    ("poll_interval_ms", "100"),
];

/// TOML configuration adapter
pub struct TomlConfigAdapter {
    config: Arc<RwLock<BTreeMap<String, String>>>,
    config_file_path: Arc<RwLock<Option<PathBuf>>>,
}

impl TomlConfigAdapter {
    /// Create an adapter holding the default settings
    pub fn new() -> Self {
        let config = DEFAULTS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            config: Arc::new(RwLock::new(config)),
            config_file_path: Arc::new(RwLock::new(None)),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, String>>, DomainError> {
        self.config
            .read()
            .map_err(|_| DomainError::Config("Configuration lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, String>>, DomainError> {
        self.config
            .write()
            .map_err(|_| DomainError::Config("Configuration lock poisoned".to_string()))
    }

    fn remember_path(&self, path: PathBuf) -> Result<(), DomainError> {
        let mut config_path = self
            .config_file_path
            .write()
            .map_err(|_| DomainError::Config("Configuration lock poisoned".to_string()))?;
        *config_path = Some(path);
        Ok(())
    }

    /// Default config file path (`nanofactory.toml` in the working directory)
    pub fn default_config_path() -> PathBuf {
        PathBuf::from("nanofactory.toml")
    }

    /// Serialize config to TOML string
    fn serialize_config(&self) -> Result<String, DomainError> {
        let config = self.read()?;
        let mut table = toml::Table::new();
        let section: toml::Table = config
            .iter()
            .map(|(k, v)| (k.clone(), toml::Value::String(v.clone())))
            .collect();
        table.insert(CONFIG_TABLE.to_string(), toml::Value::Table(section));
        toml::to_string(&table)
            .map_err(|e| DomainError::Config(format!("Failed to serialize TOML config: {}", e)))
    }

    /// Deserialize config from TOML string
    fn deserialize_config(&self, toml_content: &str) -> Result<(), DomainError> {
        let parsed: toml::Table = toml::from_str(toml_content)
            .map_err(|e| DomainError::Config(format!("Failed to parse TOML config: {}", e)))?;

        let mut config = self.write()?;
        if let Some(table) = parsed.get(CONFIG_TABLE).and_then(|s| s.as_table()) {
            for (key, value) in table {
                let text = match value {
                    toml::Value::String(s) => s.clone(),
                    toml::Value::Integer(i) => i.to_string(),
                    toml::Value::Float(f) => f.to_string(),
                    toml::Value::Boolean(b) => b.to_string(),
                    other => {
                        return Err(DomainError::Config(format!(
                            "Unsupported value for {}: {}",
                            key, other
                        )))
                    }
                };
                config.insert(key.clone(), text);
            }
        }
        Ok(())
    }
}

impl Default for TomlConfigAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_number<T: std::str::FromStr>(
    config: &BTreeMap<String, String>,
    key: &str,
) -> Result<Option<T>, DomainError>
where
    T::Err: std::fmt::Display,
{
    config
        .get(key)
        .map(|v| {
            v.parse::<T>().map_err(|e| {
                DomainError::Config(format!("Invalid value for {}: '{}' ({})", key, v, e))
            })
        })
        .transpose()
}

#[async_trait]
impl ConfigPort for TomlConfigAdapter {
    async fn get_config(&self, key: &str) -> Result<Option<String>, DomainError> {
        Ok(self.read()?.get(key).cloned())
    }

    async fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, DomainError> {
        Ok(self
            .read()?
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string()))
    }

    async fn set_config(&self, key: &str, value: &str) -> Result<(), DomainError> {
        self.write()?.insert(key.to_string(), value.to_string());
        debug!("Set config {} = {}", key, value);
        Ok(())
    }

    async fn load_config(&self, file_path: &str) -> Result<(), DomainError> {
        let path = PathBuf::from(file_path);

        if !path.exists() {
            return Err(DomainError::FsFail(format!(
                "Config file does not exist: {}",
                file_path
            )));
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| DomainError::FsFail(format!("Failed to read config file: {}", e)))?;

        self.deserialize_config(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        self.remember_path(path)
    }

    async fn save_config(&self, file_path: &str) -> Result<(), DomainError> {
        let path = PathBuf::from(file_path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DomainError::FsFail(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = self.serialize_config()?;
        std::fs::write(&path, content)
            .map_err(|e| DomainError::FsFail(format!("Failed to write config file: {}", e)))?;

        self.remember_path(path)
    }

    async fn load_default_config(&self) -> Result<(), DomainError> {
        let mut config = self.write()?;
        for (key, value) in DEFAULTS {
            config.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    async fn validate_config(&self) -> Result<(), DomainError> {
        let config = self.read()?;

        if let Some(log_level) = config.get("log_level") {
            LogLevel::parse(log_level)?;
        }
        if let Some(log_format) = config.get("log_format") {
            log_format.parse::<LogFormat>()?;
        }

        parse_number::<u16>(&config, "controller_port")?;
        for key in ["response_timeout_ms", "poll_interval_ms"] {
            parse_number::<u64>(&config, key)?;
        }
        for key in ["ready_timeout_s", "start_timeout_s"] {
            if let Some(seconds) = parse_number::<f64>(&config, key)? {
                if seconds.is_nan() || seconds <= 0.0 {
                    return Err(DomainError::Config(format!(
                        "{} must be positive, got {}",
                        key, seconds
                    )));
                }
            }
        }
        if let Some(task) = parse_number::<u8>(&config, "default_task")? {
            if task >= MAX_NUMBER_OF_TASKS {
                return Err(DomainError::Config(format!(
                    "default_task must be below {}, got {}",
                    MAX_NUMBER_OF_TASKS, task
                )));
            }
        }

        if let Some(value) = config.get("controller_dummy") {
            value.parse::<bool>().map_err(|e| {
                DomainError::Config(format!("Invalid boolean value for controller_dummy: {}", e))
            })?;
        }

        Ok(())
    }

    async fn get_all_config_keys(&self) -> Result<Vec<String>, DomainError> {
        Ok(self.read()?.keys().cloned().collect())
    }

    async fn clear_config(&self) -> Result<(), DomainError> {
        self.write()?.clear();
        self.load_default_config().await
    }

    async fn get_config_file_path(&self) -> Result<String, DomainError> {
        let config_path = self
            .config_file_path
            .read()
            .map_err(|_| DomainError::Config("Configuration lock poisoned".to_string()))?;
        let path = config_path
            .clone()
            .unwrap_or_else(Self::default_config_path);
        Ok(path.to_string_lossy().to_string())
    }
}
