//! Stage and camera coordinate transformation
//!
//! The matrix `P` maps camera pixels (relative to the image centre, with a
//! homogeneous 1) to object offsets in micrometres:
//!
//! ```text
//! [pxx pxy -x_off]
//! [pyx pyy -y_off]
//! [ 0   0  -z_off]
//! ```
//!
//! Calibration steps refine it. A step below the current level is ignored,
//! [`Calibration::Init`] always resets.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::linalg::{mul_2d, Matrix3};
use crate::domain::errors::DomainError;
use crate::domain::geometry::Point3D;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalibrationLevel {
    Init,
    Focus,
    Layer,
    Grid,
    Auto,
}

impl fmt::Display for CalibrationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CalibrationLevel::Init => "init",
            CalibrationLevel::Focus => "focus",
            CalibrationLevel::Layer => "layer",
            CalibrationLevel::Grid => "grid",
            CalibrationLevel::Auto => "auto",
        };
        write!(f, "{}", name)
    }
}

/// Calibration data of one level
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Calibration {
    /// Objective defaults
    Init,
    /// Mean lateral camera offset in pixels
    Focus { x_off: f64, y_off: f64 },
    /// Camera pitch matrix in µm per pixel
    Layer { pitch: [[f64; 2]; 2] },
    /// Affine 2×3 matrix in µm per pixel
    Grid { matrix: [[f64; 3]; 2] },
    /// Axial camera offset in µm
    Auto { z_off: f64 },
}

impl Calibration {
    pub fn level(&self) -> CalibrationLevel {
        match self {
            Calibration::Init => CalibrationLevel::Init,
            Calibration::Focus { .. } => CalibrationLevel::Focus,
            Calibration::Layer { .. } => CalibrationLevel::Layer,
            Calibration::Grid { .. } => CalibrationLevel::Grid,
            Calibration::Auto { .. } => CalibrationLevel::Auto,
        }
    }
}

/// Objective parameters used by the initial calibration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectiveOptics {
    pub camera_pitch: [[f64; 2]; 2],
    pub camera_focus: f64,
}

impl ObjectiveOptics {
    /// Read `cameraPitch` and `cameraFocus` from an objective section
    pub fn from_section(section: &Map<String, Value>) -> Result<Self, DomainError> {
        serde_json::from_value(Value::Object(section.clone())).map_err(|e| {
            DomainError::Config(format!("Invalid objective optics: {}", e))
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    objective: ObjectiveOptics,
    level: CalibrationLevel,
    matrix: Matrix3,
}

impl Transform {
    pub fn new(objective: ObjectiveOptics) -> Self {
        Self {
            objective,
            level: CalibrationLevel::Init,
            matrix: Self::initial_matrix(&objective),
        }
    }

    fn initial_matrix(objective: &ObjectiveOptics) -> Matrix3 {
        let [[pxx, pxy], [pyx, pyy]] = objective.camera_pitch;
        Matrix3([
            [pxx, pxy, 0.0],
            [pyx, pyy, 0.0],
            [0.0, 0.0, -objective.camera_focus],
        ])
    }

    pub fn level(&self) -> CalibrationLevel {
        self.level
    }

    pub fn matrix(&self) -> Matrix3 {
        self.matrix
    }

    /// Apply calibration data; returns false when a higher level is already in place
    pub fn update(&mut self, calibration: Calibration) -> bool {
        let level = calibration.level();
        if level > CalibrationLevel::Init && level < self.level {
            debug!(%level, current = %self.level, "Calibration ignored");
            return false;
        }

        let p = &mut self.matrix.0;
        match calibration {
            Calibration::Init => self.matrix = Self::initial_matrix(&self.objective),
            Calibration::Focus { x_off, y_off } => {
                let [x, y] = mul_2d([[p[0][0], p[0][1]], [p[1][0], p[1][1]]], [x_off, y_off]);
                p[0][2] = -x;
                p[1][2] = -y;
            }
            Calibration::Layer { pitch } => {
                for (row, values) in pitch.iter().enumerate() {
                    p[row][..2].copy_from_slice(values);
                }
            }
            Calibration::Grid { matrix } => {
                p[0] = matrix[0];
                p[1] = matrix[1];
            }
            Calibration::Auto { z_off } => p[2][2] = -z_off,
        }
        self.level = level;
        info!(%level, "Camera calibration updated");
        true
    }

    /// Mean calibrated pixel pitch in µm
    pub fn pitch(&self) -> f64 {
        let rows = self.matrix.block_2d();
        let mean = rows
            .iter()
            .map(|row| row.iter().map(|v| v * v).sum::<f64>())
            .sum::<f64>()
            / 2.0;
        mean.sqrt()
    }

    /// Axial camera offset in µm
    pub fn z_off(&self) -> f64 {
        -self.matrix.0[2][2]
    }

    /// Inverse matrix in pixels per µm
    pub fn inverse(&self) -> Result<Matrix3, DomainError> {
        self.matrix.inverse()
    }

    /// Object position of an image pixel seen from stage position `stage`
    pub fn object_pos(&self, px: [f64; 2], stage: Point3D) -> Point3D {
        let [dx, dy, dz] = self.matrix * [px[0], px[1], 1.0];
        Point3D::new(stage.x + dx, stage.y + dy, stage.z + dz)
    }

    /// Image pixel of object position `um` seen from stage position `stage`
    pub fn camera_pos(&self, um: Point3D, stage: Point3D) -> Result<[f64; 2], DomainError> {
        let inverse = self.inverse()?.block_2d();
        Ok(mul_2d(inverse, [um.x - stage.x, um.y - stage.y]))
    }

    /// Stage position that shows object position `um` at image pixel `px`
    pub fn stage_pos(&self, um: Point3D, px: [f64; 2]) -> Point3D {
        let [dx, dy, dz] = self.matrix * [px[0], px[1], 1.0];
        Point3D::new(um.x - dx, um.y - dy, um.z - dz)
    }
}
