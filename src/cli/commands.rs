//! Command implementations

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::info;

use crate::aerobasic::setups::{IfovSetup, ZLine};
use crate::app::calibration_interactor::{AttenuatorRequest, PlaneFitRequest, PlaneScanRequest};
use crate::app::container::AppContainer;
use crate::app::draw_interactor::{DrawRequest, SetupKind};
use crate::app::run_interactor::{RunMode, RunRequest};
use crate::app::DrawInteractor;
use crate::cli::args::{
    AttenuatorArgs, ConfigAction, ConfigArgs, DrawArgs, InfoArgs, PlaneFitArgs, PlaneScanArgs,
    RunArgs, SetupArgs, SetupKindArg, StatusArgs, TraceArgs,
};
use crate::cli::Commands;
use crate::domain::constants::{ProgrammingMode, VelocityMode};
use crate::ports::ConfigPort;
use crate::tools::plane::PlaneSummary;
use crate::utils::Utils;

/// Dispatch a parsed command
pub async fn execute(command: Commands, container: &dyn AppContainer, config: &dyn ConfigPort) -> Result<()> {
    match command {
        Commands::Draw(args) => draw(args, container).await,
        Commands::Trace(args) => trace(args, container).await,
        Commands::Setup(args) => setup(args, container),
        Commands::Run(args) => run(args, container).await,
        Commands::Status(args) => status(args, container).await,
        Commands::PlaneFit(args) => plane_fit(args, container).await,
        Commands::PlaneScan(args) => plane_scan(args, container).await,
        Commands::Attenuator(args) => attenuator(args, container).await,
        Commands::Config(args) => config_command(args, container, config).await,
        Commands::Info(args) => info_command(args),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output to JSON")?;
    println!("{}", json);
    Ok(())
}

/// Execute the draw command
pub async fn draw(args: DrawArgs, container: &dyn AppContainer) -> Result<()> {
    info!("Starting draw operation");
    let response = container
        .draw_interactor()
        .execute(DrawRequest {
            job: args.job.clone(),
            output: args.output.clone(),
            compact: args.compact,
        })
        .await
        .with_context(|| format!("Failed to draw job {}", args.job.display()))?;

    if args.json {
        return print_json(&response.summary);
    }
    match &response.output {
        Some(output) => {
            println!("Program written to {}", output.display());
            println!("Shapes: {}", response.shapes);
            println!("{}", response.summary);
        }
        None => print!("{}", DrawInteractor::render(&response.program, args.compact, true)),
    }
    Ok(())
}

/// Execute the trace command
pub async fn trace(args: TraceArgs, container: &dyn AppContainer) -> Result<()> {
    let report = container
        .draw_interactor()
        .trace(&args.program)
        .await
        .with_context(|| format!("Failed to trace program {}", args.program.display()))?;

    if args.json {
        if args.movements {
            print_json(&report)?;
        } else {
            print_json(&report.summary)?;
        }
        return Ok(());
    }

    if args.movements {
        for movement in &report.movements {
            let state = if movement.laser_on() { "ON " } else { "OFF" };
            let start = movement.start();
            let end = movement.end();
            println!(
                "[{}] ({:.4}, {:.4}, {:.4}) -> ({:.4}, {:.4}, {:.4}) {}",
                state,
                start.x,
                start.y,
                start.z,
                end.x,
                end.y,
                end.z,
                Utils::format_length(movement.length())
            );
        }
    }
    println!("{}", report.summary);
    Ok(())
}

/// Execute the setup command
pub fn setup(args: SetupArgs, container: &dyn AppContainer) -> Result<()> {
    let kind = match args.kind {
        SetupKindArg::Default => SetupKind::Default {
            programming_mode: if args.incremental {
                ProgrammingMode::Incremental
            } else {
                ProgrammingMode::Absolute
            },
            velocity_mode: if args.velocity_off {
                VelocityMode::Off
            } else {
                VelocityMode::On
            },
        },
        SetupKindArg::Ifov => SetupKind::Ifov(IfovSetup {
            size: args.ifov_size,
            time: args.ifov_time,
            tracking_speed: args.tracking_speed,
            tracking_acceleration: args.tracking_acceleration,
        }),
        SetupKindArg::Zline => SetupKind::ZLine(ZLine::new(args.dz, args.fast_speed, args.slow_speed)),
    };
    let program = container
        .draw_interactor()
        .setup(kind)
        .context("Failed to build setup snippet")?;

    match args.output {
        Some(path) => {
            program
                .write(&path, true)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Setup written to {}", path.display());
        }
        None => print!("{}", DrawInteractor::render(&program, true, false)),
    }
    Ok(())
}

/// Execute the run command
pub async fn run(args: RunArgs, container: &dyn AppContainer) -> Result<()> {
    info!("Starting run operation: {}", args.program.display());
    let mode = if args.task {
        RunMode::Task {
            task_id: args.task_id,
            wait: !args.no_wait,
            timeout: args
                .timeout
                .map(Duration::try_from_secs_f64)
                .transpose()
                .context("Invalid timeout")?,
        }
    } else {
        RunMode::Synchronous
    };

    let response = container
        .run_interactor()
        .execute(RunRequest {
            program: args.program.clone(),
            mode,
            home: args.home,
        })
        .await
        .with_context(|| format!("Failed to run program {}", args.program.display()))?;

    if let Some(lines) = response.lines_sent {
        println!("Sent {} lines", lines);
    }
    if let (Some(task), Some(state)) = (response.task_id, response.final_state) {
        println!("Task {}: {:?}", task, state);
    }
    println!("Elapsed: {}", Utils::format_duration(response.elapsed));
    Ok(())
}

/// Execute the status command
pub async fn status(args: StatusArgs, container: &dyn AppContainer) -> Result<()> {
    let report = container
        .status_interactor()
        .execute(args.tasks)
        .await
        .context("Failed to query controller status")?;
    if args.json {
        print_json(&report)
    } else {
        println!("{}", report);
        Ok(())
    }
}

fn display_plane(name: &str, plane: &PlaneSummary) {
    println!("{} plane:", name);
    println!("  z = {:.6} x + {:.6} y + {:.4}", plane.x_slope, plane.y_slope, plane.z0);
    println!(
        "  Polar angle: {:.4}°, azimuth: {:.2}°",
        plane.polar_angle, plane.azimuth_angle
    );
    println!(
        "  Deviation: {:.4} average, {:.4} max ({} points)",
        plane.avg_deviation,
        plane.max_deviation,
        plane.points.len()
    );
}

fn display_container(path: Option<&PathBuf>) {
    if let Some(path) = path {
        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        println!("Container: {} ({})", path.display(), Utils::format_file_size(size));
    }
}

/// Execute the plane-fit command
pub async fn plane_fit(args: PlaneFitArgs, container: &dyn AppContainer) -> Result<()> {
    let report = container
        .calibration_interactor()
        .plane_fit(PlaneFitRequest {
            points: args.points.clone(),
            container: args.container,
            user: args.user,
        })
        .await
        .with_context(|| format!("Failed to fit plane to {}", args.points.display()))?;

    if args.json {
        return print_json(&report);
    }
    display_plane("Fitted", &report.plane);
    display_container(report.container.as_ref());
    Ok(())
}

/// Execute the plane-scan command
pub async fn plane_scan(args: PlaneScanArgs, container: &dyn AppContainer) -> Result<()> {
    let report = container
        .calibration_interactor()
        .plane_scan(PlaneScanRequest {
            x0: args.x0,
            y0: args.y0,
            dx: args.dx,
            dy: args.dy,
            nx: args.nx,
            ny: args.ny,
            z_lower: args.z_lower,
            z_upper: args.z_upper,
            container: args.container,
            user: args.user,
        })
        .await
        .context("Plane scan failed")?;

    if args.json {
        return print_json(&report);
    }
    println!("Scanned {} positions", report.steps);
    display_plane("Lower", &report.results.lower);
    display_plane("Upper", &report.results.upper);
    display_container(report.container.as_ref());
    Ok(())
}

/// Execute the attenuator command
pub async fn attenuator(args: AttenuatorArgs, container: &dyn AppContainer) -> Result<()> {
    let report = container
        .calibration_interactor()
        .attenuator(AttenuatorRequest {
            calibration: args.calibration,
            fit: args.fit,
            order: args.order,
            value: args.value,
            power: args.power,
            container: args.container,
            user: args.user,
        })
        .await
        .context("Failed to load attenuator calibration")?;

    if args.json {
        return print_json(&report);
    }
    println!(
        "Attenuator: {:.2} - {:.2} mW ({} steps).",
        report.power_min, report.power_max, report.steps
    );
    if let (Some(value), Some(power)) = (args.value, report.power) {
        println!("Value {:.4} -> {:.4} mW", value, power);
    }
    if let (Some(power), Some(value)) = (args.power, report.value) {
        println!("{:.4} mW -> value {:.4}", power, value);
    }
    display_container(report.container.as_ref());
    Ok(())
}

/// Execute the config command
pub async fn config_command(
    args: ConfigArgs,
    container: &dyn AppContainer,
    config: &dyn ConfigPort,
) -> Result<()> {
    match args.action {
        ConfigAction::Show => {
            for key in config.get_all_config_keys().await? {
                let value = config.get_config_or_default(&key, "").await?;
                println!("{} = {:?}", key, value);
            }
        }
        ConfigAction::Get { key } => {
            let value = config
                .get_config(&key)
                .await?
                .with_context(|| format!("Unknown setting {}", key))?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value, file } => {
            if config.get_config(&key).await?.is_none() {
                anyhow::bail!("Unknown setting {}", key);
            }
            config.set_config(&key, &value).await?;
            config.validate_config().await.context("Invalid setting")?;
            let path = match file {
                Some(path) => path,
                None => PathBuf::from(config.get_config_file_path().await?),
            };
            let path_text = path.to_string_lossy();
            config
                .save_config(&path_text)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{} = {:?} written to {}", key, value, path.display());
        }
        ConfigAction::System { user, objective } => {
            let system = container.system_config();
            match (user, objective) {
                (Some(user), _) => print_json(&system.user(&user)?)?,
                (None, Some(objective)) => print_json(&system.objective(&objective)?)?,
                (None, None) => println!("{}", system),
            }
        }
    }
    Ok(())
}

/// Execute the info command
pub fn info_command(args: InfoArgs) -> Result<()> {
    let info = json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "authors": env!("CARGO_PKG_AUTHORS"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "license": env!("CARGO_PKG_LICENSE"),
        "readme": "README.md",
        "operatingSystem": "OS independent",
    });
    if args.json {
        return print_json(&info);
    }
    println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    println!("{}", env!("CARGO_PKG_DESCRIPTION"));
    println!("Authors: {}", env!("CARGO_PKG_AUTHORS"));
    println!("License: {}", env!("CARGO_PKG_LICENSE"));
    println!("Platform: OS independent (running on {})", std::env::consts::OS);
    Ok(())
}
