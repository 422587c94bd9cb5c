// Coordinate system - Maps drawing coordinates onto machine axes

use serde::{Deserialize, Serialize};

use crate::domain::axis::Axis;
use crate::domain::errors::DomainError;
use crate::domain::geometry::{Coordinates, Point3D, Unit};

/// Height of the substrate surface as a function of the lateral position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ZFunction {
    /// Flat, level substrate
    Constant(f64),
    /// Tilted plane `z = x_slope * x + y_slope * y + z0`
    Plane { x_slope: f64, y_slope: f64, z0: f64 },
}

impl ZFunction {
    pub fn z_at(&self, x: f64, y: f64) -> f64 {
        match *self {
            ZFunction::Constant(z) => z,
            ZFunction::Plane {
                x_slope,
                y_slope,
                z0,
            } => x_slope * x + y_slope * y + z0,
        }
    }
}

impl Default for ZFunction {
    fn default() -> Self {
        ZFunction::Constant(0.0)
    }
}

/// Direction in which drawing heights grow relative to the machine z axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropDirection {
    #[default]
    Up,
    Down,
}

impl DropDirection {
    fn sign(self) -> f64 {
        match self {
            DropDirection::Up => 1.0,
            DropDirection::Down => -1.0,
        }
    }
}

/// Machine axis receiving each drawing axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisMapping {
    pub x: Axis,
    pub y: Axis,
    pub z: Axis,
}

impl AxisMapping {
    /// Drawing x/y onto the galvo scanner (A/B)
    pub fn galvo() -> Self {
        Self {
            x: Axis::A,
            y: Axis::B,
            z: Axis::Z,
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        for (name, axis) in [("x", self.x), ("y", self.y), ("z", self.z)] {
            axis.require_single(&format!("Axis mapping for {}", name))?;
        }
        if (self.x | self.y | self.z).bits().count_ones() != 3 {
            return Err(DomainError::Axis(format!(
                "Axis mapping must use three distinct axes, got {}, {}, {}",
                self.x, self.y, self.z
            )));
        }
        Ok(())
    }
}

impl Default for AxisMapping {
    fn default() -> Self {
        Self {
            x: Axis::X,
            y: Axis::Y,
            z: Axis::Z,
        }
    }
}

/// Placement of a drawing on the machine.
///
/// Drawing positions are given in `unit` relative to `(offset_x, offset_y)`, heights
/// relative to the substrate surface described by `z_function`. The converted
/// coordinates are machine positions in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinateSystem {
    pub offset_x: f64,
    pub offset_y: f64,
    pub z_function: ZFunction,
    pub drop_direction: DropDirection,
    pub unit: Unit,
    pub axis_mapping: AxisMapping,
}

impl Default for CoordinateSystem {
    fn default() -> Self {
        Self {
            offset_x: 0.0,
            offset_y: 0.0,
            z_function: ZFunction::default(),
            drop_direction: DropDirection::Up,
            unit: Unit::Mm,
            axis_mapping: AxisMapping::default(),
        }
    }
}

impl CoordinateSystem {
    pub fn new(offset_x: f64, offset_y: f64, z_function: ZFunction) -> Self {
        Self {
            offset_x,
            offset_y,
            z_function,
            ..Self::default()
        }
    }

    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }

    pub fn with_drop_direction(mut self, drop_direction: DropDirection) -> Self {
        self.drop_direction = drop_direction;
        self
    }

    pub fn with_axis_mapping(mut self, axis_mapping: AxisMapping) -> Self {
        self.axis_mapping = axis_mapping;
        self
    }

    /// Absolute position of a drawing point, still in drawing units
    pub fn absolute(&self, point: Point3D) -> Point3D {
        let x = self.offset_x + point.x;
        let y = self.offset_y + point.y;
        let z0 = self.z_function.z_at(x, y);
        Point3D::new(x, y, z0 + self.drop_direction.sign() * point.z)
    }

    /// Machine coordinates (mm) of a drawing point
    pub fn convert(&self, point: Point3D) -> Coordinates {
        let absolute = self.absolute(point) * self.unit.factor();
        Coordinates::new()
            .with(self.axis_mapping.x, absolute.x)
            .with(self.axis_mapping.y, absolute.y)
            .with(self.axis_mapping.z, absolute.z)
    }

    /// Machine lateral coordinates (mm) of a drawing point, height omitted
    pub fn convert_lateral(&self, point: Point3D) -> Coordinates {
        let mut coords = self.convert(point);
        coords.remove(self.axis_mapping.z);
        coords
    }

    /// Machine velocity (mm/s) of a drawing velocity
    pub fn convert_velocity(&self, velocity: f64) -> f64 {
        velocity * self.unit.factor()
    }
}
