use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info};

use crate::adapters::{AsciiTcpAdapter, DummyControllerAdapter, SimulatedLayerAdapter};
use crate::app::{CalibrationInteractor, DrawInteractor, RunInteractor, StatusInteractor};
use crate::devices::ControllerSettings;
use crate::domain::coordinate_system::ZFunction;
use crate::domain::errors::DomainError;
use crate::ports::{ConfigPort, ControllerPort, LayerDetectorPort};
use crate::settings::SystemConfig;
use crate::utils::logging::{LogFormat, LogLevel, LoggingConfig};

/// System configuration section describing the simulated resin layer
pub const SIMULATED_LAYER_SECTION: &str = "simulatedLayer";
const SIMULATED_LOWER: f64 = 0.0;
const SIMULATED_UPPER: f64 = 50.0;

/// Typed view of the application settings
#[derive(Debug, Clone, PartialEq)]
pub struct AppSettings {
    pub logging: LoggingConfig,
    pub controller_host: String,
    pub controller_port: u16,
    pub controller_dummy: bool,
    pub response_timeout: Duration,
    pub system_config: Option<PathBuf>,
    pub controller: ControllerSettings,
}

async fn setting(config: &dyn ConfigPort, key: &str) -> Result<String, DomainError> {
    config
        .get_config(key)
        .await?
        .ok_or_else(|| DomainError::Config(format!("Missing setting {}", key)))
}

async fn parsed<T: std::str::FromStr>(config: &dyn ConfigPort, key: &str) -> Result<T, DomainError> {
    let value = setting(config, key).await?;
    value
        .trim()
        .parse()
        .map_err(|_| DomainError::Config(format!("Invalid value for {}: '{}'", key, value)))
}

fn optional_path(value: String) -> Option<PathBuf> {
    let value = value.trim();
    (!value.is_empty()).then(|| PathBuf::from(value))
}

impl AppSettings {
    /// Validate and read every setting from the config port
    pub async fn from_config(config: &dyn ConfigPort) -> Result<Self, DomainError> {
        config.validate_config().await?;

        let logging = LoggingConfig {
            level: LogLevel::parse(&setting(config, "log_level").await?)?,
            format: setting(config, "log_format").await?.parse::<LogFormat>()?,
            file: optional_path(setting(config, "log_file").await?),
        };
        let controller = ControllerSettings {
            program_dir: PathBuf::from(setting(config, "program_dir").await?),
            default_task: parsed(config, "default_task").await?,
            ready_timeout: Duration::from_secs_f64(parsed(config, "ready_timeout_s").await?),
            start_timeout: Duration::from_secs_f64(parsed(config, "start_timeout_s").await?),
            poll_interval: Duration::from_millis(parsed(config, "poll_interval_ms").await?),
        };

        Ok(Self {
            logging,
            controller_host: setting(config, "controller_host").await?,
            controller_port: parsed(config, "controller_port").await?,
            controller_dummy: parsed(config, "controller_dummy").await?,
            response_timeout: Duration::from_millis(parsed(config, "response_timeout_ms").await?),
            system_config: optional_path(setting(config, "system_config").await?),
            controller,
        })
    }
}

/// Site configuration from the configured file, the home directory or nothing
fn load_system_config(path: Option<&PathBuf>) -> Result<SystemConfig, DomainError> {
    match path {
        Some(path) => SystemConfig::load(path),
        None => SystemConfig::load_or_default(None).or_else(|e| {
            debug!("Using an empty system configuration: {}", e);
            Ok(SystemConfig::default())
        }),
    }
}

fn layer_plane(section: &serde_json::Map<String, Value>, key: &str, default: f64) -> Result<ZFunction, DomainError> {
    match section.get(key) {
        Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
            DomainError::Config(format!("Invalid {}.{}: {}", SIMULATED_LAYER_SECTION, key, e))
        }),
        None => Ok(ZFunction::Constant(default)),
    }
}

pub trait AppContainer: Send + Sync {
    fn settings(&self) -> &AppSettings;
    fn system_config(&self) -> Arc<SystemConfig>;
    fn draw_interactor(&self) -> Arc<DrawInteractor>;
    fn run_interactor(&self) -> Arc<RunInteractor>;
    fn status_interactor(&self) -> Arc<StatusInteractor>;
    fn calibration_interactor(&self) -> Arc<CalibrationInteractor>;
}

pub struct DefaultAppContainer {
    settings: AppSettings,
    system_config: Arc<SystemConfig>,
    draw_interactor: Arc<DrawInteractor>,
    run_interactor: Arc<RunInteractor>,
    status_interactor: Arc<StatusInteractor>,
    calibration_interactor: Arc<CalibrationInteractor>,
}

impl DefaultAppContainer {
    /// Wire adapters and interactors from the settings held by `config`
    pub async fn new(config: Arc<dyn ConfigPort>) -> Result<Self, DomainError> {
        let settings = AppSettings::from_config(config.as_ref()).await?;
        let system_config = Arc::new(load_system_config(settings.system_config.as_ref())?);

        let controller_port: Arc<dyn ControllerPort> = if settings.controller_dummy {
            info!("Using the dummy controller");
            Arc::new(DummyControllerAdapter::new())
        } else {
            Arc::new(AsciiTcpAdapter::new(
                &settings.controller_host,
                settings.controller_port,
                settings.response_timeout,
            ))
        };

        let layer = system_config.section(SIMULATED_LAYER_SECTION);
        let layer_port = Arc::new(SimulatedLayerAdapter::new(
            layer_plane(&layer, "lower", SIMULATED_LOWER)?,
            layer_plane(&layer, "upper", SIMULATED_UPPER)?,
        ));

        let draw_interactor = Arc::new(DrawInteractor::new());
        let run_interactor = Arc::new(RunInteractor::new(
            Arc::clone(&controller_port),
            settings.controller.clone(),
        ));
        let status_interactor = Arc::new(StatusInteractor::new(
            Arc::clone(&controller_port),
            settings.controller.clone(),
        ));
        let calibration_interactor = Arc::new(CalibrationInteractor::new(
            Arc::clone(&system_config),
            Arc::clone(&layer_port) as Arc<dyn LayerDetectorPort>,
        ));

        Ok(Self {
            settings,
            system_config,
            draw_interactor,
            run_interactor,
            status_interactor,
            calibration_interactor,
        })
    }
}

impl AppContainer for DefaultAppContainer {
    fn settings(&self) -> &AppSettings {
        &self.settings
    }

    fn system_config(&self) -> Arc<SystemConfig> {
        Arc::clone(&self.system_config)
    }

    fn draw_interactor(&self) -> Arc<DrawInteractor> {
        Arc::clone(&self.draw_interactor)
    }

    fn run_interactor(&self) -> Arc<RunInteractor> {
        Arc::clone(&self.run_interactor)
    }

    fn status_interactor(&self) -> Arc<StatusInteractor> {
        Arc::clone(&self.status_interactor)
    }

    fn calibration_interactor(&self) -> Arc<CalibrationInteractor> {
        Arc::clone(&self.calibration_interactor)
    }
}
