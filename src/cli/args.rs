//! Command-line argument definitions

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};
use clap_num::number_range;

use crate::devices::FitKind;
use crate::domain::constants::MAX_NUMBER_OF_TASKS;

fn task_id(s: &str) -> Result<u8, String> {
    number_range(s, 0, MAX_NUMBER_OF_TASKS - 1)
}

fn fit_kind(s: &str) -> Result<FitKind, String> {
    s.parse().map_err(|e: crate::domain::errors::DomainError| e.to_string())
}

/// Arguments for the draw command
#[derive(Args, Debug)]
pub struct DrawArgs {
    /// Job file (YAML, TOML or JSON)
    pub job: PathBuf,

    /// Write the program here instead of printing it
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Omit the comments around the variable block
    #[arg(long)]
    pub compact: bool,

    /// Print the tool path summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the trace command
#[derive(Args, Debug)]
pub struct TraceArgs {
    /// AeroBasic program file
    pub program: PathBuf,

    /// List every movement
    #[arg(long)]
    pub movements: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Setup snippet kinds
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupKindArg {
    /// Default controller state
    Default,
    /// Infinite field of view
    Ifov,
    /// Exposed vertical line
    Zline,
}

/// Arguments for the setup command
#[derive(Args, Debug)]
pub struct SetupArgs {
    /// Snippet to print
    #[arg(value_enum)]
    pub kind: SetupKindArg,

    /// Incremental instead of absolute programming
    #[arg(long)]
    pub incremental: bool,

    /// Disable velocity profiling
    #[arg(long)]
    pub velocity_off: bool,

    /// IFOV size
    #[arg(long, default_value_t = 0.5)]
    pub ifov_size: f64,

    /// IFOV time
    #[arg(long, default_value_t = 10.0)]
    pub ifov_time: f64,

    /// IFOV tracking speed
    #[arg(long, default_value_t = 500.0)]
    pub tracking_speed: f64,

    /// IFOV tracking acceleration
    #[arg(long, default_value_t = 500.0)]
    pub tracking_acceleration: f64,

    /// Length of the vertical line
    #[arg(long, default_value_t = 0.01)]
    pub dz: f64,

    /// Speed of the unexposed moves
    #[arg(long, default_value_t = 0.1)]
    pub fast_speed: f64,

    /// Speed of the exposed move
    #[arg(long, default_value_t = 0.01)]
    pub slow_speed: f64,

    /// Write the snippet here instead of printing it
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// AeroBasic program file
    pub program: PathBuf,

    /// Run as a controller task instead of line by line
    #[arg(long)]
    pub task: bool,

    /// Task to run the program in (default from settings)
    #[arg(long, value_parser = task_id, requires = "task")]
    pub task_id: Option<u8>,

    /// Return once the task has started
    #[arg(long, requires = "task")]
    pub no_wait: bool,

    /// Give up waiting after this many seconds
    #[arg(long)]
    pub timeout: Option<f64>,

    /// Home all axes first
    #[arg(long)]
    pub home: bool,
}

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Include all controller tasks
    #[arg(long)]
    pub tasks: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the plane-fit command
#[derive(Args, Debug)]
pub struct PlaneFitArgs {
    /// CSV file with x,y,z columns
    pub points: PathBuf,

    /// Store the result in a data container
    #[arg(long)]
    pub container: Option<PathBuf>,

    /// User key for the container author
    #[arg(long)]
    pub user: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the plane-scan command
#[derive(Args, Debug)]
pub struct PlaneScanArgs {
    /// Grid origin x
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub x0: f64,

    /// Grid origin y
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub y0: f64,

    /// Grid spacing in x
    #[arg(long, allow_negative_numbers = true)]
    pub dx: f64,

    /// Grid spacing in y
    #[arg(long, allow_negative_numbers = true)]
    pub dy: f64,

    /// Positions along x
    #[arg(long, default_value_t = 3)]
    pub nx: usize,

    /// Positions along y
    #[arg(long, default_value_t = 3)]
    pub ny: usize,

    /// Initial estimate of the lower interface
    #[arg(long, allow_negative_numbers = true)]
    pub z_lower: f64,

    /// Initial estimate of the upper interface
    #[arg(long, allow_negative_numbers = true)]
    pub z_upper: f64,

    /// Store the scan in a data container
    #[arg(long)]
    pub container: Option<PathBuf>,

    /// User key for the container author
    #[arg(long)]
    pub user: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the attenuator command
#[derive(Args, Debug)]
pub struct AttenuatorArgs {
    /// Calibration file (default from the system configuration)
    #[arg(long)]
    pub calibration: Option<PathBuf>,

    /// Interpolation (linear, cubic or poly)
    #[arg(long, value_parser = fit_kind)]
    pub fit: Option<FitKind>,

    /// Polynomial order for the poly fit
    #[arg(long)]
    pub order: Option<usize>,

    /// Attenuator value to convert to power
    #[arg(long)]
    pub value: Option<f64>,

    /// Laser power in mW to convert to an attenuator value
    #[arg(long)]
    pub power: Option<f64>,

    /// Store the calibration in a data container
    #[arg(long)]
    pub container: Option<PathBuf>,

    /// User key for the container author
    #[arg(long)]
    pub user: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the config command
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective settings
    Show,
    /// Print one setting
    Get { key: String },
    /// Write the effective settings with one change to a file
    Set {
        key: String,
        value: String,
        /// Settings file to write (default: nanofactory.toml)
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Print the system configuration or one of its users or objectives
    System {
        /// Show this user section
        #[arg(long, conflicts_with = "objective")]
        user: Option<String>,
        /// Show this objective section
        #[arg(long)]
        objective: Option<String>,
    },
}

/// Arguments for the info command
#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}
