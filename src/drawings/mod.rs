//! Printable structures
//!
//! A [`Drawable`] emits AeroBasic motion for a structure described in drawing
//! coordinates. [`DrawableProgram`] converts every point through a
//! [`CoordinateSystem`] before it becomes a command, so the same structure can be
//! printed at any place of the substrate. [`Shape`] is the serializable union used
//! by job files.

pub mod circle;
pub mod lens;
pub mod lines;

use serde::{Deserialize, Serialize};

use crate::aerobasic::{AeroBasic, AeroBasicProgram, ArcMove, Feed};
use crate::domain::axis::Axis;
use crate::domain::constants::CircleDirection;
use crate::domain::coordinate_system::CoordinateSystem;
use crate::domain::errors::DomainError;
use crate::domain::geometry::{Coordinates, Point3D, EPS};

pub use circle::{Circle2D, CircleFill, FilledCircle2D};
pub use lens::{AsphericalLens, Cylinder, SphericalLens};
pub use lines::{
    Corner, CornerRectangle, PolyLine, PolyLines, Rectangle3D, SingleLine, VerticalLine, XLines,
    YLines,
};

/// Axis whose galvo laser override gates the exposure
pub const LASER_AXIS: Axis = Axis::A;

/// Structure that can be turned into motion commands
pub trait Drawable {
    /// Reference point of the structure in drawing coordinates
    fn center_point(&self) -> Point3D;

    fn draw_on(&self, coordinate_system: &CoordinateSystem) -> Result<DrawableProgram, DomainError>;
}

/// Optional F (dependent) or E (independent) feed rate in drawing units per second
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeedRate {
    #[serde(default, alias = "F", skip_serializing_if = "Option::is_none")]
    pub f: Option<f64>,
    #[serde(default, alias = "E", skip_serializing_if = "Option::is_none")]
    pub e: Option<f64>,
}

impl FeedRate {
    pub fn dependent(velocity: f64) -> Self {
        Self {
            f: Some(velocity),
            e: None,
        }
    }

    pub fn resolve(&self) -> Result<Option<Feed>, DomainError> {
        Feed::from_parts(self.f, self.e)
    }
}

/// Program under construction together with the coordinate system it draws in
#[derive(Debug, Clone, PartialEq)]
pub struct DrawableProgram {
    coordinate_system: CoordinateSystem,
    program: AeroBasicProgram,
}

impl DrawableProgram {
    pub fn new(coordinate_system: CoordinateSystem) -> Self {
        Self {
            coordinate_system,
            program: AeroBasicProgram::new(),
        }
    }

    pub fn coordinate_system(&self) -> &CoordinateSystem {
        &self.coordinate_system
    }

    pub fn program(&self) -> &AeroBasicProgram {
        &self.program
    }

    pub fn into_program(self) -> AeroBasicProgram {
        self.program
    }

    pub fn comment(&mut self, text: &str) {
        self.program.comment(text);
    }

    /// Append another drawing; the coordinate system of `self` is kept
    pub fn append(&mut self, other: DrawableProgram) {
        self.program.append(&other.program);
    }

    /// Linear move to a drawing point
    pub fn linear_to(&mut self, point: Point3D, feed: Option<Feed>) -> String {
        let coordinates = self.coordinate_system.convert(point);
        let feed = feed.map(|f| f.scaled(self.coordinate_system.unit.factor()));
        self.program.linear(&coordinates, feed)
    }

    /// Arc in the drawing plane ending at `end` around `center`.
    ///
    /// The height of the start point is kept for the whole arc.
    pub fn arc_to(
        &mut self,
        direction: CircleDirection,
        end: Point3D,
        center: Point3D,
        velocity: Option<f64>,
    ) -> Result<String, DomainError> {
        let mapping = self.coordinate_system.axis_mapping;
        let end_coords = self.coordinate_system.convert_lateral(end);
        let center_coords = self.coordinate_system.convert_lateral(center);
        let lookup = |coords: &Coordinates, axis: Axis| {
            coords.get(axis).ok_or_else(|| {
                DomainError::Geometry(format!("No value for axis {} after conversion", axis))
            })
        };

        let arc = ArcMove::with_center(
            (
                mapping.x,
                lookup(&end_coords, mapping.x)?,
                lookup(&center_coords, mapping.x)?,
            ),
            (
                mapping.y,
                lookup(&end_coords, mapping.y)?,
                lookup(&center_coords, mapping.y)?,
            ),
            velocity.map(|v| self.coordinate_system.convert_velocity(v)),
        );
        match direction {
            CircleDirection::Clockwise => self.program.cw(&arc),
            CircleDirection::CounterClockwise => self.program.ccw(&arc),
        }
    }

    pub fn laser(&mut self, on: bool) -> Result<String, DomainError> {
        self.program.galvo_laser_override(LASER_AXIS, on.into())
    }
}

impl AeroBasic for DrawableProgram {
    fn send(&mut self, command: &str) -> String {
        self.program.send(command)
    }
}

/// Any structure a job file can describe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    SingleLine(SingleLine),
    XLines(XLines),
    YLines(YLines),
    PolyLine(PolyLine),
    PolyLines(PolyLines),
    VerticalLine(VerticalLine),
    Corner(Corner),
    CornerRectangle(CornerRectangle),
    #[serde(rename = "rectangle_3d")]
    Rectangle3D(Rectangle3D),
    #[serde(rename = "circle")]
    Circle2D(Circle2D),
    #[serde(rename = "filled_circle")]
    FilledCircle2D(FilledCircle2D),
    SphericalLens(SphericalLens),
    AsphericalLens(AsphericalLens),
    Cylinder(Cylinder),
}

impl Shape {
    pub fn name(&self) -> &'static str {
        match self {
            Shape::SingleLine(_) => "single_line",
            Shape::XLines(_) => "x_lines",
            Shape::YLines(_) => "y_lines",
            Shape::PolyLine(_) => "poly_line",
            Shape::PolyLines(_) => "poly_lines",
            Shape::VerticalLine(_) => "vertical_line",
            Shape::Corner(_) => "corner",
            Shape::CornerRectangle(_) => "corner_rectangle",
            Shape::Rectangle3D(_) => "rectangle_3d",
            Shape::Circle2D(_) => "circle",
            Shape::FilledCircle2D(_) => "filled_circle",
            Shape::SphericalLens(_) => "spherical_lens",
            Shape::AsphericalLens(_) => "aspherical_lens",
            Shape::Cylinder(_) => "cylinder",
        }
    }

    fn as_drawable(&self) -> &dyn Drawable {
        match self {
            Shape::SingleLine(s) => s,
            Shape::XLines(s) => s,
            Shape::YLines(s) => s,
            Shape::PolyLine(s) => s,
            Shape::PolyLines(s) => s,
            Shape::VerticalLine(s) => s,
            Shape::Corner(s) => s,
            Shape::CornerRectangle(s) => s,
            Shape::Rectangle3D(s) => s,
            Shape::Circle2D(s) => s,
            Shape::FilledCircle2D(s) => s,
            Shape::SphericalLens(s) => s,
            Shape::AsphericalLens(s) => s,
            Shape::Cylinder(s) => s,
        }
    }
}

impl Drawable for Shape {
    fn center_point(&self) -> Point3D {
        self.as_drawable().center_point()
    }

    fn draw_on(&self, coordinate_system: &CoordinateSystem) -> Result<DrawableProgram, DomainError> {
        self.as_drawable().draw_on(coordinate_system)
    }
}

/// Number of slices needed to cover `extent` with slices no thicker than `step`
pub(crate) fn slice_count(extent: f64, step: f64, what: &str) -> Result<usize, DomainError> {
    if step.is_nan() || step <= 0.0 {
        return Err(DomainError::Geometry(format!(
            "{} must be positive, got {}",
            what, step
        )));
    }
    if !extent.is_finite() || extent < 0.0 {
        return Err(DomainError::Geometry(format!(
            "Extent must be a finite non-negative number, got {}",
            extent
        )));
    }
    Ok((extent / step - EPS).ceil().max(0.0) as usize)
}
