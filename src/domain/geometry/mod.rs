// Geometry - Units, points and small planar helpers

use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

use crate::domain::axis::{Axis, CANONICAL_ORDER};

/// Tolerance used by the intersection routines
pub const EPS: f64 = 1e-9;

/// Length unit with its size in millimetres
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Nm,
    Um,
    #[default]
    Mm,
    Cm,
}

impl Unit {
    /// Size of one unit in millimetres
    pub fn factor(self) -> f64 {
        match self {
            Unit::Nm => 1e-6,
            Unit::Um => 1e-3,
            Unit::Mm => 1.0,
            Unit::Cm => 10.0,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Unit::Nm => "nm",
            Unit::Um => "µm",
            Unit::Mm => "mm",
            Unit::Cm => "cm",
        }
    }
}

/// A length carrying its unit
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UnitValue {
    pub value: f64,
    pub unit: Unit,
}

impl UnitValue {
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    pub fn as_mm(self) -> f64 {
        self.value * self.unit.factor()
    }

    /// Same length expressed in another unit
    pub fn to(self, unit: Unit) -> UnitValue {
        UnitValue::new(self.as_mm() / unit.factor(), unit)
    }
}

impl Add for UnitValue {
    type Output = UnitValue;

    /// Same units stay, mixed units are expressed in mm
    fn add(self, rhs: UnitValue) -> UnitValue {
        if self.unit == rhs.unit {
            UnitValue::new(self.value + rhs.value, self.unit)
        } else {
            UnitValue::new(self.as_mm() + rhs.as_mm(), Unit::Mm)
        }
    }
}

impl Mul<f64> for UnitValue {
    type Output = UnitValue;

    fn mul(self, rhs: f64) -> UnitValue {
        UnitValue::new(self.value * rhs, self.unit)
    }
}

impl PartialEq for UnitValue {
    fn eq(&self, other: &Self) -> bool {
        (self.as_mm() - other.as_mm()).abs() <= EPS * self.as_mm().abs().max(1.0)
    }
}

impl fmt::Display for UnitValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.symbol())
    }
}

/// Point in the drawing plane
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Rotate counter-clockwise around the origin
    pub fn rotate_2d(self, rad: f64) -> Self {
        let (sin, cos) = rad.sin_cos();
        Self::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }

    pub fn distance(self, other: Point2D) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn with_z(self, z: f64) -> Point3D {
        Point3D::new(self.x, self.y, z)
    }
}

/// Point in drawing space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3D {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Point3D {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Rotate counter-clockwise around the z axis, z is kept
    pub fn rotate_2d(self, rad: f64) -> Self {
        self.xy().rotate_2d(rad).with_z(self.z)
    }

    pub fn xy(self) -> Point2D {
        Point2D::new(self.x, self.y)
    }

    pub fn distance(self, other: Point3D) -> f64 {
        let d = self - other;
        (d.x * d.x + d.y * d.y + d.z * d.z).sqrt()
    }

    pub fn as_coordinates(self) -> Coordinates {
        Coordinates::new()
            .with(Axis::X, self.x)
            .with(Axis::Y, self.y)
            .with(Axis::Z, self.z)
    }
}

impl From<Point2D> for Point3D {
    fn from(p: Point2D) -> Self {
        p.with_z(0.0)
    }
}

impl fmt::Display for Point2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Point2D(X={}, Y={})", self.x, self.y)
    }
}

impl fmt::Display for Point3D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Point3D(X={}, Y={}, Z={})", self.x, self.y, self.z)
    }
}

macro_rules! impl_point_ops {
    ($point:ident { $($field:ident),+ }) => {
        impl Add for $point {
            type Output = $point;
            fn add(self, rhs: $point) -> $point {
                $point { $($field: self.$field + rhs.$field),+ }
            }
        }

        impl Sub for $point {
            type Output = $point;
            fn sub(self, rhs: $point) -> $point {
                $point { $($field: self.$field - rhs.$field),+ }
            }
        }

        impl Mul<f64> for $point {
            type Output = $point;
            fn mul(self, rhs: f64) -> $point {
                $point { $($field: self.$field * rhs),+ }
            }
        }

        impl Neg for $point {
            type Output = $point;
            fn neg(self) -> $point {
                $point { $($field: -self.$field),+ }
            }
        }
    };
}

impl_point_ops!(Point2D { x, y });
impl_point_ops!(Point3D { x, y, z });

impl Add<Point2D> for Point3D {
    type Output = Point3D;

    fn add(self, rhs: Point2D) -> Point3D {
        Point3D::new(self.x + rhs.x, self.y + rhs.y, self.z)
    }
}

/// Partial assignment of positions to single axes
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Coordinates {
    values: [Option<f64>; 5],
}

impl Coordinates {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(axis: Axis) -> Option<usize> {
        CANONICAL_ORDER.iter().position(|(a, _)| *a == axis)
    }

    /// Assign `value` to every axis in `axis`
    pub fn with(mut self, axis: Axis, value: f64) -> Self {
        self.set(axis, value);
        self
    }

    pub fn set(&mut self, axis: Axis, value: f64) {
        for single in axis.iter_single() {
            if let Some(slot) = Self::slot(single) {
                self.values[slot] = Some(value);
            }
        }
    }

    pub fn get(&self, axis: Axis) -> Option<f64> {
        Self::slot(axis).and_then(|slot| self.values[slot])
    }

    pub fn remove(&mut self, axis: Axis) -> Option<f64> {
        Self::slot(axis).and_then(|slot| self.values[slot].take())
    }

    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }

    /// Axes holding a value
    pub fn axes(&self) -> Axis {
        self.iter().fold(Axis::empty(), |acc, (axis, _)| acc | axis)
    }

    /// Assigned (axis, value) pairs in canonical axis order
    pub fn iter(&self) -> impl Iterator<Item = (Axis, f64)> + '_ {
        CANONICAL_ORDER
            .iter()
            .zip(self.values.iter())
            .filter_map(|((axis, _), value)| value.map(|v| (*axis, v)))
    }
}

/// Result of intersecting a line with a circle
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircleIntersection {
    None,
    One(Point2D),
    Two(Point2D, Point2D),
}

impl CircleIntersection {
    pub fn points(&self) -> Vec<Point2D> {
        match *self {
            CircleIntersection::None => Vec::new(),
            CircleIntersection::One(p) => vec![p],
            CircleIntersection::Two(p, q) => vec![p, q],
        }
    }
}

/// Intersect the infinite line through `p1` and `p2` with a circle
pub fn line_circle_intersection(
    p1: Point2D,
    p2: Point2D,
    center: Point2D,
    radius: f64,
) -> CircleIntersection {
    // Shift so the circle sits at the origin, line as a*x + b*y + c = 0
    let (x1, y1) = (p1.x - center.x, p1.y - center.y);
    let (x2, y2) = (p2.x - center.x, p2.y - center.y);
    let a = y1 - y2;
    let b = x2 - x1;
    let c = x1 * y2 - x2 * y1;

    let norm = a * a + b * b;
    if norm < EPS {
        return CircleIntersection::None;
    }

    let x0 = -a * c / norm;
    let y0 = -b * c / norm;
    let r2 = radius * radius;

    if c * c > r2 * norm + EPS {
        CircleIntersection::None
    } else if (c * c - r2 * norm).abs() < EPS {
        CircleIntersection::One(Point2D::new(x0, y0) + center)
    } else {
        let d = r2 - c * c / norm;
        let mult = (d / norm).sqrt();
        let first = Point2D::new(x0 + b * mult, y0 - a * mult) + center;
        let second = Point2D::new(x0 - b * mult, y0 + a * mult) + center;
        if first.distance(second) < EPS {
            CircleIntersection::One(first)
        } else {
            CircleIntersection::Two(first, second)
        }
    }
}

/// Grid positions, row by row (y outer, x inner)
pub fn grid_coordinates(x0: f64, y0: f64, dx: f64, dy: f64, nx: usize, ny: usize) -> Vec<Point2D> {
    (0..ny)
        .flat_map(|j| (0..nx).map(move |i| Point2D::new(x0 + i as f64 * dx, y0 + j as f64 * dy)))
        .collect()
}
