// Draw interactor - Turns job files into AeroBasic programs

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aerobasic::setups::{default_setup, IfovSetup, ZLine};
use crate::aerobasic::trace::{self, Movement, TraceSummary};
use crate::aerobasic::{AeroBasic, AeroBasicProgram, RenderOptions};
use crate::domain::constants::{ProgrammingMode, VelocityMode};
use crate::domain::coordinate_system::CoordinateSystem;
use crate::drawings::{Drawable, Shape};
use crate::error::{NanoFactoryError, NanoResult};
use crate::utils::path::{FileFormat, PathUtils};

/// Controller state a job program starts from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSetup {
    pub programming_mode: ProgrammingMode,
    pub velocity_mode: VelocityMode,
    /// IFOV block emitted after the default setup
    pub ifov: Option<IfovSetup>,
}

impl Default for JobSetup {
    fn default() -> Self {
        Self {
            programming_mode: ProgrammingMode::Absolute,
            velocity_mode: VelocityMode::On,
            ifov: None,
        }
    }
}

/// Printing job: where to draw, how to set up the controller and what to draw
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub coordinate_system: CoordinateSystem,
    #[serde(default)]
    pub setup: JobSetup,
    /// Raw AeroBasic lines sent after the setup
    #[serde(default)]
    pub preamble: Vec<String>,
    pub shapes: Vec<Shape>,
}

impl Job {
    pub fn parse(text: &str, format: FileFormat) -> NanoResult<Self> {
        let job = match format {
            FileFormat::Yaml => serde_yaml::from_str(text)?,
            FileFormat::Toml => toml::from_str(text)?,
            FileFormat::Json => serde_json::from_str(text)?,
        };
        Ok(job)
    }

    /// Read a job file; the format follows the extension
    pub fn load(path: &Path) -> NanoResult<Self> {
        let format = PathUtils::file_format(path)?;
        let text = std::fs::read_to_string(path)?;
        let job = Self::parse(&text, format).map_err(|e| NanoFactoryError::InvalidJob {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        job.coordinate_system
            .axis_mapping
            .validate()
            .map_err(|e| NanoFactoryError::InvalidJob {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        debug!(path = %path.display(), %format, shapes = job.shapes.len(), "Job loaded");
        Ok(job)
    }
}

/// Request for drawing a job file
#[derive(Debug, Clone)]
pub struct DrawRequest {
    pub job: PathBuf,
    pub output: Option<PathBuf>,
    pub compact: bool,
}

/// Result of drawing a job
#[derive(Debug, Clone)]
pub struct DrawResponse {
    pub program: AeroBasicProgram,
    pub summary: TraceSummary,
    pub shapes: usize,
    pub output: Option<PathBuf>,
}

/// Tool path of a program file
#[derive(Debug, Clone, Serialize)]
pub struct TraceReport {
    pub movements: Vec<Movement>,
    pub summary: TraceSummary,
}

/// Stand-alone program snippets
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SetupKind {
    Default {
        programming_mode: ProgrammingMode,
        velocity_mode: VelocityMode,
    },
    Ifov(IfovSetup),
    ZLine(ZLine),
}

/// Interactor for drawing, tracing and setup snippets
#[derive(Debug, Default)]
pub struct DrawInteractor;

impl DrawInteractor {
    pub fn new() -> Self {
        Self
    }

    /// Load a job file, draw it and optionally write the program
    pub async fn execute(&self, request: DrawRequest) -> NanoResult<DrawResponse> {
        info!("Drawing job {}", request.job.display());
        PathUtils::require_file(&request.job)?;
        let job = Job::load(&request.job)?;
        let mut response = self.draw(&job)?;

        if let Some(output) = request.output {
            response.program.write(&output, request.compact)?;
            info!("Program written to {}", output.display());
            response.output = Some(output);
        }
        Ok(response)
    }

    /// Program for a job: setup, preamble, then every shape in order
    pub fn draw(&self, job: &Job) -> NanoResult<DrawResponse> {
        let mut program = default_setup(job.setup.programming_mode, job.setup.velocity_mode);
        if let Some(ifov) = &job.setup.ifov {
            program.append(&ifov.program());
        }
        if !job.preamble.is_empty() {
            program.comment("\nPreamble");
            for line in &job.preamble {
                program.send(line);
            }
        }

        for (index, shape) in job.shapes.iter().enumerate() {
            let drawing = shape.draw_on(&job.coordinate_system)?;
            program.comment(&format!("\nShape {}: {}", index + 1, shape.name()));
            program.append(drawing.program());
            debug!(shape = shape.name(), lines = drawing.program().len(), "Shape drawn");
        }

        let movements = trace::read_text(&program.to_text())?;
        let summary = TraceSummary::from_movements(&movements);
        info!(
            shapes = job.shapes.len(),
            lines = program.len(),
            exposed_mm = summary.exposed_length,
            "Job drawn"
        );
        Ok(DrawResponse {
            program,
            summary,
            shapes: job.shapes.len(),
            output: None,
        })
    }

    /// Follow the tool path of a program file
    pub async fn trace(&self, path: &Path) -> NanoResult<TraceReport> {
        PathUtils::require_file(path)?;
        let text = std::fs::read_to_string(path)?;
        let movements = trace::read_text(&text)?;
        let summary = TraceSummary::from_movements(&movements);
        info!(path = %path.display(), movements = movements.len(), "Program traced");
        Ok(TraceReport { movements, summary })
    }

    pub fn setup(&self, kind: SetupKind) -> NanoResult<AeroBasicProgram> {
        let program = match kind {
            SetupKind::Default {
                programming_mode,
                velocity_mode,
            } => default_setup(programming_mode, velocity_mode),
            SetupKind::Ifov(ifov) => ifov.program(),
            SetupKind::ZLine(zline) => zline.program()?,
        };
        Ok(program)
    }

    /// Program text as written to files, optionally without the timestamp header
    pub fn render(program: &AeroBasicProgram, compact: bool, timestamp: bool) -> String {
        program.render(&RenderOptions {
            compact,
            add_timestamp: timestamp,
            ..RenderOptions::default()
        })
    }
}
