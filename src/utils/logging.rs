//! Logging configuration and progress reporting
//!
//! Log records go to stderr as text or JSON, optionally mirrored to a file.
//! `RUST_LOG` takes precedence over the configured level.

use std::fmt;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as fmt_layer, EnvFilter};

use crate::domain::errors::DomainError;

/// Log level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(DomainError::Config(format!(
                "Invalid log level '{}' (expected error, warn, info, debug or trace)",
                s
            ))),
        }
    }

    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl FromStr for LogLevel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogLevel::parse(s)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_filter())
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text
    #[default]
    Text,
    /// One JSON object per record
    Json,
}

impl FromStr for LogFormat {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(DomainError::Config(format!(
                "Invalid log format '{}' (expected text or json)",
                s
            ))),
        }
    }
}

/// Logging configuration options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Optional file receiving a plain text copy of every record
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Text,
            file: None,
        }
    }
}

/// Logging system manager
pub struct LoggingSystem {
    config: LoggingConfig,
}

impl LoggingSystem {
    pub fn new(config: LoggingConfig) -> Self {
        Self { config }
    }

    /// Install the global subscriber; a second call leaves the first one active
    pub fn initialize(&self) -> Result<(), DomainError> {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.config.level.as_filter()));

        let json = self.config.format == LogFormat::Json;
        let text_layer = (!json).then(|| {
            fmt_layer::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
        });
        let json_layer = json.then(|| fmt_layer::layer().json().with_writer(std::io::stderr));

        let file_layer = match &self.config.file {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| {
                        DomainError::Config(format!(
                            "Cannot open log file {}: {}",
                            path.display(),
                            e
                        ))
                    })?;
                Some(
                    fmt_layer::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
            }
            None => None,
        };

        if tracing_subscriber::registry()
            .with(filter)
            .with(text_layer)
            .with(json_layer)
            .with(file_layer)
            .try_init()
            .is_err()
        {
            tracing::debug!("Logging already initialized");
        }

        tracing::debug!(
            level = %self.config.level,
            format = ?self.config.format,
            "Logging system initialized"
        );
        Ok(())
    }

    /// Log package and platform information
    pub fn log_system_info(&self) {
        tracing::info!(
            "{} {} on {}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS
        );
    }
}

impl Default for LoggingSystem {
    fn default() -> Self {
        Self::new(LoggingConfig::default())
    }
}

/// Progress reporter for long-running operations such as controller tasks
pub struct ProgressReporter {
    current_operation: Option<String>,
    start_time: Option<Instant>,
    updates: usize,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            current_operation: None,
            start_time: None,
            updates: 0,
        }
    }

    pub fn start_operation(&mut self, operation: &str) {
        self.current_operation = Some(operation.to_string());
        self.start_time = Some(Instant::now());
        self.updates = 0;
        tracing::info!("Starting: {}", operation);
    }

    /// Report the current state of the running operation
    pub fn update(&mut self, description: &str) {
        self.updates += 1;
        let elapsed = self
            .start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or_default();
        tracing::info!(
            operation = self.current_operation.as_deref().unwrap_or("-"),
            poll = self.updates,
            elapsed_s = elapsed,
            "{}",
            description
        );
    }

    pub fn complete_operation(&mut self, success: bool) {
        if let Some(operation) = &self.current_operation {
            let status = if success { "completed" } else { "failed" };
            match self.start_time {
                Some(start_time) => tracing::info!(
                    "{} {} in {:.2}s",
                    operation,
                    status,
                    start_time.elapsed().as_secs_f64()
                ),
                None => tracing::info!("{} {}", operation, status),
            }
        }
        self.current_operation = None;
        self.start_time = None;
    }

    pub fn updates(&self) -> usize {
        self.updates
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}
