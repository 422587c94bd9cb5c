//! Circles, concentric fills and the layer factory used by round structures

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Drawable, DrawableProgram};
use crate::domain::constants::CircleDirection;
use crate::domain::coordinate_system::CoordinateSystem;
use crate::domain::errors::DomainError;
use crate::domain::geometry::{Point2D, Point3D, EPS};

/// Full circle in the plane of `center`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circle2D {
    pub center: Point3D,
    pub radius: f64,
    #[serde(default)]
    pub velocity: Option<f64>,
    #[serde(default)]
    pub direction: CircleDirection,
}

impl Circle2D {
    pub fn new(center: Point3D, radius: f64) -> Self {
        Self {
            center,
            radius,
            velocity: None,
            direction: CircleDirection::Clockwise,
        }
    }

    pub fn with_velocity(mut self, velocity: Option<f64>) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_direction(mut self, direction: CircleDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn start_point(&self) -> Point3D {
        self.center + Point2D::new(self.radius, 0.0)
    }
}

impl Drawable for Circle2D {
    fn center_point(&self) -> Point3D {
        self.center
    }

    fn draw_on(&self, coordinate_system: &CoordinateSystem) -> Result<DrawableProgram, DomainError> {
        if self.radius <= 0.0 {
            return Err(DomainError::Geometry(format!(
                "Circle radius must be positive, got {}",
                self.radius
            )));
        }
        let start = self.start_point();
        let mut program = DrawableProgram::new(*coordinate_system);
        program.comment(&format!(
            "\nDraw circle with radius {} at {}",
            self.radius, self.center
        ));
        program.linear_to(start, None);
        program.laser(true)?;
        program.arc_to(self.direction, start, self.center, self.velocity)?;
        program.laser(false)?;
        Ok(program)
    }
}

/// Concentric circles from `radius_start` towards `radius_end` (exclusive)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilledCircle2D {
    pub center: Point3D,
    pub radius_start: f64,
    #[serde(default)]
    pub radius_end: f64,
    pub hatch_size: f64,
    #[serde(default)]
    pub velocity: Option<f64>,
    #[serde(default)]
    pub direction: CircleDirection,
}

impl FilledCircle2D {
    pub fn new(center: Point3D, radius_start: f64, radius_end: f64, hatch_size: f64) -> Self {
        Self {
            center,
            radius_start,
            radius_end,
            hatch_size,
            velocity: None,
            direction: CircleDirection::Clockwise,
        }
    }

    /// Radii of the drawn circles in drawing order
    pub fn radii(&self) -> Result<Vec<f64>, DomainError> {
        if self.hatch_size.is_nan() || self.hatch_size.abs() < EPS {
            return Err(DomainError::Geometry(format!(
                "Hatch size must not be zero, got {}",
                self.hatch_size
            )));
        }
        let span = self.radius_end - self.radius_start;
        let step = if span / self.hatch_size < 0.0 {
            -self.hatch_size
        } else {
            self.hatch_size
        };
        let count = (span / step - EPS).ceil().max(0.0) as usize;
        Ok((0..count)
            .map(|i| self.radius_start + i as f64 * step)
            .collect())
    }
}

impl Drawable for FilledCircle2D {
    fn center_point(&self) -> Point3D {
        self.center
    }

    fn draw_on(&self, coordinate_system: &CoordinateSystem) -> Result<DrawableProgram, DomainError> {
        let mut program = DrawableProgram::new(*coordinate_system);
        for radius in self.radii()? {
            if radius <= EPS {
                debug!(radius, "Skipping circle without radius");
                continue;
            }
            let circle = Circle2D::new(self.center, radius)
                .with_velocity(self.velocity)
                .with_direction(self.direction);
            program.append(circle.draw_on(coordinate_system)?);
        }
        Ok(program)
    }
}

/// How a round layer of a lens or cylinder is exposed
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CircleFill {
    /// Concentric circles from the outline inwards
    Filled { hatch_size: f64 },
    /// Only the outline
    #[default]
    Outline,
}

impl CircleFill {
    /// Layer of the given radius, `None` for layers without area
    pub fn layer(
        &self,
        center: Point3D,
        radius: f64,
        velocity: Option<f64>,
    ) -> Option<Box<dyn Drawable>> {
        if radius <= EPS {
            return None;
        }
        Some(match *self {
            CircleFill::Filled { hatch_size } => Box::new(FilledCircle2D {
                velocity,
                ..FilledCircle2D::new(center, radius, 0.0, hatch_size)
            }),
            CircleFill::Outline => Box::new(Circle2D::new(center, radius).with_velocity(velocity)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::coordinate_system::{DropDirection, ZFunction};
    use crate::domain::geometry::Unit;

    #[test]
    fn test_single_circle() {
        let cs = CoordinateSystem::new(17.5, 21.0, ZFunction::Constant(25.214))
            .with_drop_direction(DropDirection::Up)
            .with_unit(Unit::Mm);
        let program = Circle2D::new(Point3D::default(), 0.2)
            .draw_on(&cs)
            .unwrap()
            .into_program();
        let lines = program.lines();
        assert_eq!(lines[0], "");
        assert!(lines[1].starts_with("' Draw circle with radius 0.2"));
        assert_eq!(lines[2], "LINEAR X17.7000000000 Y21.0000000000 Z25.2140000000");
        assert_eq!(lines[3], "GALVO LASEROVERRIDE A ON");
        assert_eq!(
            lines[4],
            "CW X17.7000000000 Y21.0000000000 I17.5000000000 J21.0000000000"
        );
        assert_eq!(lines[5], "GALVO LASEROVERRIDE A OFF");
    }

    #[test]
    fn test_zero_radius_is_rejected() {
        assert!(Circle2D::new(Point3D::default(), 0.0)
            .draw_on(&CoordinateSystem::default())
            .is_err());
    }

    #[test]
    fn test_filled_circle_radii_shrink() {
        let filled = FilledCircle2D::new(Point3D::default(), 0.2, 0.0, 0.05);
        let radii = filled.radii().unwrap();
        assert_eq!(radii.len(), 4);
        assert!((radii[0] - 0.2).abs() < 1e-12);
        assert!((radii[3] - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_filled_ring_grows() {
        let ring = FilledCircle2D::new(Point3D::default(), 0.1, 0.2, 0.05);
        let radii = ring.radii().unwrap();
        assert_eq!(radii.len(), 2);
        assert!((radii[1] - 0.15).abs() < 1e-12);
        assert!(FilledCircle2D::new(Point3D::default(), 0.1, 0.2, 0.0).radii().is_err());
    }

    #[test]
    fn test_filled_circle_skips_zero_radius() {
        let filled = FilledCircle2D::new(Point3D::default(), 0.0, 0.1, 0.05);
        let program = filled.draw_on(&CoordinateSystem::default()).unwrap();
        let arcs = program.program().iter().filter(|l| l.starts_with("CW")).count();
        assert_eq!(arcs, 1);
    }

    #[test]
    fn test_circle_fill_layers() {
        assert!(CircleFill::Outline.layer(Point3D::default(), 0.0, None).is_none());
        let layer = CircleFill::Filled { hatch_size: 0.1 }
            .layer(Point3D::new(1.0, 1.0, 0.0), 0.3, Some(2.0))
            .unwrap();
        let program = layer.draw_on(&CoordinateSystem::default()).unwrap();
        let arcs: Vec<&String> = program.program().iter().filter(|l| l.starts_with("CW")).collect();
        assert_eq!(arcs.len(), 3);
        assert!(arcs[0].ends_with("F2.000000"));
    }
}
