//! CLI module for NanoFactory
//!
//! This module handles command-line argument parsing and command execution.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod args;
pub mod commands;

/// NanoFactory laser nanofabrication control
///
/// Generates AeroBasic programs for the A3200 motion controller, runs them,
/// reports controller status and evaluates device calibrations.
#[derive(Parser, Debug)]
#[command(name = "nanofactory")]
#[command(about = "NanoFactory - Control software for laser nanofabrication")]
#[command(version)]
#[command(long_about = None)]
pub struct Cli {
    /// Logging level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log output format (text or json)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Mirror log records to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Settings file (TOML with a [nanofactory] table)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Use the offline dummy controller
    #[arg(long, global = true)]
    pub dummy: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate an AeroBasic program from a job file
    Draw(args::DrawArgs),
    /// Summarize the tool path of an AeroBasic program
    Trace(args::TraceArgs),
    /// Print a setup snippet
    Setup(args::SetupArgs),
    /// Send a program to the controller
    Run(args::RunArgs),
    /// Show controller, axis and task status
    Status(args::StatusArgs),
    /// Fit a plane to measured points
    PlaneFit(args::PlaneFitArgs),
    /// Scan the resin interfaces on a grid and fit both planes
    PlaneScan(args::PlaneScanArgs),
    /// Convert between attenuator value and laser power
    Attenuator(args::AttenuatorArgs),
    /// Show or change settings
    Config(args::ConfigArgs),
    /// Show package information
    Info(args::InfoArgs),
}
