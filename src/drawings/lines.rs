//! Straight-line structures: single lines, hatched line sets, polylines and corner markers

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use super::{slice_count, Drawable, DrawableProgram, FeedRate};
use crate::aerobasic::Feed;
use crate::domain::coordinate_system::CoordinateSystem;
use crate::domain::errors::DomainError;
use crate::domain::geometry::{Point2D, Point3D, EPS};

/// Straight exposed line between two points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleLine {
    pub start: Point3D,
    pub end: Point3D,
    #[serde(default)]
    pub feed: FeedRate,
}

impl SingleLine {
    pub fn new(start: Point3D, end: Point3D, feed: FeedRate) -> Self {
        Self { start, end, feed }
    }
}

impl Drawable for SingleLine {
    fn center_point(&self) -> Point3D {
        (self.start + self.end) * 0.5
    }

    fn draw_on(&self, coordinate_system: &CoordinateSystem) -> Result<DrawableProgram, DomainError> {
        let feed = self.feed.resolve()?;
        let mut program = DrawableProgram::new(*coordinate_system);
        program.linear_to(self.start, feed);
        program.laser(true)?;
        program.linear_to(self.end, feed);
        program.laser(false)?;
        Ok(program)
    }
}

fn direction(segment: (f64, f64)) -> i8 {
    if segment.1 > segment.0 {
        1
    } else if segment.1 < segment.0 {
        -1
    } else {
        0
    }
}

fn validate_segments(segments: &[(f64, f64)]) -> Result<i8, DomainError> {
    let first = *segments
        .first()
        .ok_or_else(|| DomainError::Geometry("Line set without segments".to_string()))?;
    let expected = direction(first);
    for (i, segment) in segments.iter().enumerate().skip(1) {
        if direction(*segment) != expected {
            return Err(DomainError::Geometry(format!(
                "Direction mismatch. Line {} does not match with direction of line 0 ({:?} vs {:?})",
                i, first, segment
            )));
        }
    }
    Ok(expected)
}

/// Segments on one axis with a run-in before the first and a run-out after the last
/// segment, long enough to reach `velocity` with `acceleration`.
fn draw_segments<F>(
    coordinate_system: &CoordinateSystem,
    segments: &[(f64, f64)],
    velocity: f64,
    acceleration: f64,
    point: F,
) -> Result<DrawableProgram, DomainError>
where
    F: Fn(f64) -> Point3D,
{
    let sign = f64::from(validate_segments(segments)?);
    if velocity <= 0.0 || acceleration <= 0.0 {
        return Err(DomainError::Geometry(format!(
            "Velocity and acceleration must be positive (velocity={}, acceleration={})",
            velocity, acceleration
        )));
    }

    let feed = Some(Feed::Dependent(velocity));
    let run_distance = velocity * velocity / (2.0 * acceleration);
    let mut program = DrawableProgram::new(*coordinate_system);

    program.linear_to(point(segments[0].0 - sign * run_distance), feed);
    for (start, end) in segments {
        program.linear_to(point(*start), feed);
        program.laser(true)?;
        program.linear_to(point(*end), feed);
        program.laser(false)?;
    }
    let last_end = segments[segments.len() - 1].1;
    program.linear_to(point(last_end + sign * run_distance), feed);
    Ok(program)
}

/// Segments along X at fixed y and z, all pointing the same way
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XLines {
    pub y: f64,
    pub z: f64,
    pub segments: Vec<(f64, f64)>,
    pub velocity: f64,
    pub acceleration: f64,
}

impl XLines {
    pub fn new(
        y: f64,
        z: f64,
        segments: Vec<(f64, f64)>,
        velocity: f64,
        acceleration: f64,
    ) -> Result<Self, DomainError> {
        validate_segments(&segments)?;
        Ok(Self {
            y,
            z,
            segments,
            velocity,
            acceleration,
        })
    }
}

impl Drawable for XLines {
    fn center_point(&self) -> Point3D {
        let x = match (self.segments.first(), self.segments.last()) {
            (Some(first), Some(last)) => (first.0 + last.1) / 2.0,
            _ => 0.0,
        };
        Point3D::new(x, self.y, self.z)
    }

    fn draw_on(&self, coordinate_system: &CoordinateSystem) -> Result<DrawableProgram, DomainError> {
        draw_segments(
            coordinate_system,
            &self.segments,
            self.velocity,
            self.acceleration,
            |x| Point3D::new(x, self.y, self.z),
        )
    }
}

/// Segments along Y at fixed x and z, all pointing the same way
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YLines {
    pub x: f64,
    pub z: f64,
    pub segments: Vec<(f64, f64)>,
    pub velocity: f64,
    pub acceleration: f64,
}

impl YLines {
    pub fn new(
        x: f64,
        z: f64,
        segments: Vec<(f64, f64)>,
        velocity: f64,
        acceleration: f64,
    ) -> Result<Self, DomainError> {
        validate_segments(&segments)?;
        Ok(Self {
            x,
            z,
            segments,
            velocity,
            acceleration,
        })
    }
}

impl Drawable for YLines {
    fn center_point(&self) -> Point3D {
        let y = match (self.segments.first(), self.segments.last()) {
            (Some(first), Some(last)) => (first.0 + last.1) / 2.0,
            _ => 0.0,
        };
        Point3D::new(self.x, y, self.z)
    }

    fn draw_on(&self, coordinate_system: &CoordinateSystem) -> Result<DrawableProgram, DomainError> {
        draw_segments(
            coordinate_system,
            &self.segments,
            self.velocity,
            self.acceleration,
            |y| Point3D::new(self.x, y, self.z),
        )
    }
}

fn bounding_center<'a>(points: impl Iterator<Item = &'a Point3D>) -> Point3D {
    let mut bounds: Option<(Point3D, Point3D)> = None;
    for p in points {
        bounds = Some(match bounds {
            None => (*p, *p),
            Some((lo, hi)) => (
                Point3D::new(lo.x.min(p.x), lo.y.min(p.y), lo.z.min(p.z)),
                Point3D::new(hi.x.max(p.x), hi.y.max(p.y), hi.z.max(p.z)),
            ),
        });
    }
    bounds
        .map(|(lo, hi)| (lo + hi) * 0.5)
        .unwrap_or_default()
}

/// Connected exposed path through a list of points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolyLine {
    pub points: Vec<Point3D>,
    #[serde(default)]
    pub feed: FeedRate,
}

impl PolyLine {
    pub fn new(points: Vec<Point3D>, feed: FeedRate) -> Self {
        Self { points, feed }
    }
}

impl Drawable for PolyLine {
    fn center_point(&self) -> Point3D {
        bounding_center(self.points.iter())
    }

    fn draw_on(&self, coordinate_system: &CoordinateSystem) -> Result<DrawableProgram, DomainError> {
        let (first, rest) = self
            .points
            .split_first()
            .ok_or_else(|| DomainError::Geometry("Polyline without points".to_string()))?;
        let feed = self.feed.resolve()?;

        let mut program = DrawableProgram::new(*coordinate_system);
        program.linear_to(*first, feed);
        program.laser(true)?;
        for point in rest {
            program.linear_to(*point, feed);
        }
        program.laser(false)?;
        Ok(program)
    }
}

/// Independent polylines drawn one after another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolyLines {
    pub lines: Vec<Vec<Point3D>>,
    #[serde(default)]
    pub feed: FeedRate,
}

impl PolyLines {
    pub fn new(lines: Vec<Vec<Point3D>>, feed: FeedRate) -> Self {
        Self { lines, feed }
    }
}

impl Drawable for PolyLines {
    fn center_point(&self) -> Point3D {
        bounding_center(self.lines.iter().flatten())
    }

    fn draw_on(&self, coordinate_system: &CoordinateSystem) -> Result<DrawableProgram, DomainError> {
        let mut program = DrawableProgram::new(*coordinate_system);
        for (i, line) in self.lines.iter().enumerate() {
            program.comment(&format!("\n[Polyline] - Draw line {}:", i));
            let poly_line = PolyLine::new(line.clone(), self.feed);
            program.append(poly_line.draw_on(coordinate_system)?);
        }
        Ok(program)
    }
}

/// Exposed line along the height axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerticalLine {
    pub position: Point2D,
    pub z_min: f64,
    pub z_max: f64,
    #[serde(default)]
    pub feed: FeedRate,
}

impl Drawable for VerticalLine {
    fn center_point(&self) -> Point3D {
        self.position.with_z(0.0)
    }

    fn draw_on(&self, coordinate_system: &CoordinateSystem) -> Result<DrawableProgram, DomainError> {
        let feed = self.feed.resolve()?;
        let mut program = DrawableProgram::new(*coordinate_system);
        program.linear_to(self.position.with_z(self.z_min), feed);
        program.laser(true)?;
        program.linear_to(self.position.with_z(self.z_max), feed);
        program.laser(false)?;
        Ok(program)
    }
}

fn default_hatch_size() -> f64 {
    0.5
}

fn default_layer_height() -> f64 {
    0.75
}

/// L-shaped alignment marker.
///
/// ```text
///              length
/// \-----------------   |
/// |\----------------   |
/// ||X----------------  width
/// |||\--------------   |
/// ||||\-------------   |
/// |||||
/// ```
///
/// `corner_center` is the point marked X; both arms are `width` wide and reach
/// `length` from the outer edge. Each hatch line runs arm, diagonal, arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Corner {
    pub corner_center: Point3D,
    pub length: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default = "default_hatch_size")]
    pub hatch_size: f64,
    #[serde(default = "default_layer_height")]
    pub layer_height: f64,
    #[serde(default)]
    pub rotation_degree: f64,
    #[serde(default)]
    pub feed: FeedRate,
}

impl Corner {
    pub fn new(corner_center: Point3D, length: f64, width: f64, height: f64) -> Self {
        Self {
            corner_center,
            length,
            width,
            height,
            hatch_size: default_hatch_size(),
            layer_height: default_layer_height(),
            rotation_degree: 0.0,
            feed: FeedRate::default(),
        }
    }

    pub fn with_rotation(mut self, rotation_degree: f64) -> Self {
        self.rotation_degree = rotation_degree;
        self
    }

    pub fn with_feed(mut self, feed: FeedRate) -> Self {
        self.feed = feed;
        self
    }

    pub fn with_hatching(mut self, hatch_size: f64, layer_height: f64) -> Self {
        self.hatch_size = hatch_size;
        self.layer_height = layer_height;
        self
    }

    fn rotation_rad(&self) -> f64 {
        self.rotation_degree / 180.0 * PI
    }

    /// Number of hatch lines per layer and the hatch distance that spreads them over the width
    pub fn hatching(&self) -> Result<(usize, f64), DomainError> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.hatch_size) || !positive(self.width) || !positive(self.length) {
            return Err(DomainError::Geometry(format!(
                "Corner needs positive length, width and hatch size (length={}, width={}, hatch_size={})",
                self.length, self.width, self.hatch_size
            )));
        }
        let n = (self.width / self.hatch_size).round() as usize + 1;
        if n < 2 {
            return Err(DomainError::Geometry(format!(
                "Corner width {} is too narrow for hatch size {}",
                self.width, self.hatch_size
            )));
        }
        Ok((n, self.width / (n - 1) as f64))
    }

    fn single_layer(&self, center: Point3D, n: usize, hatch: f64, change_start: bool) -> PolyLines {
        let rotation = self.rotation_rad();
        let offset = self.length - self.width / 2.0;
        let lines = (0..n)
            .map(|i| {
                let diagonal = -(i as f64 - n as f64 / 2.0) * hatch;
                let p1 = center + Point2D::new(offset, diagonal).rotate_2d(rotation);
                let p2 = center + Point2D::new(diagonal, diagonal).rotate_2d(rotation);
                let p3 = center + Point2D::new(diagonal, offset).rotate_2d(rotation);
                if (i + usize::from(change_start)) % 2 == 0 {
                    vec![p1, p2, p3]
                } else {
                    vec![p3, p2, p1]
                }
            })
            .collect();
        PolyLines::new(lines, self.feed)
    }
}

impl Drawable for Corner {
    fn center_point(&self) -> Point3D {
        let center_offset = (self.length - self.width) / 2.0;
        self.corner_center + Point2D::new(center_offset, center_offset).rotate_2d(self.rotation_rad())
    }

    fn draw_on(&self, coordinate_system: &CoordinateSystem) -> Result<DrawableProgram, DomainError> {
        let (n, hatch) = self.hatching()?;
        let layers = slice_count(self.height, self.layer_height, "Layer height")?;

        let mut program = DrawableProgram::new(*coordinate_system);
        for layer in 0..layers {
            let z = layer as f64 * self.layer_height;
            let center = self.corner_center + Point3D::new(0.0, 0.0, z);
            let poly_lines = self.single_layer(center, n, hatch, layer % 2 == 1);
            program.append(poly_lines.draw_on(coordinate_system)?);
        }
        Ok(program)
    }
}

/// Four corner markers framing a rectangle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CornerRectangle {
    pub center: Point3D,
    pub rectangle_width: f64,
    pub rectangle_height: f64,
    pub corner_length: f64,
    pub corner_width: f64,
    pub height: f64,
    #[serde(default = "default_layer_height")]
    pub layer_height: f64,
    #[serde(default = "default_hatch_size")]
    pub hatch_size: f64,
    #[serde(default)]
    pub feed: FeedRate,
}

impl CornerRectangle {
    fn corner(&self, dx: f64, dy: f64, rotation_degree: f64) -> Corner {
        Corner::new(
            self.center + Point2D::new(dx, dy),
            self.corner_length,
            self.corner_width,
            self.height,
        )
        .with_hatching(self.hatch_size, self.layer_height)
        .with_rotation(rotation_degree)
        .with_feed(self.feed)
    }

    /// Corners in drawing order with their labels
    pub fn corners(&self) -> [(&'static str, Corner); 4] {
        let w = self.rectangle_width / 2.0;
        let h = self.rectangle_height / 2.0;
        [
            ("Top Left", self.corner(-w, -h, 0.0)),
            ("Top Right", self.corner(w, -h, 90.0)),
            ("Bottom Right", self.corner(w, h, 180.0)),
            ("Bottom Left", self.corner(-w, h, 270.0)),
        ]
    }
}

impl Drawable for CornerRectangle {
    fn center_point(&self) -> Point3D {
        self.center
    }

    fn draw_on(&self, coordinate_system: &CoordinateSystem) -> Result<DrawableProgram, DomainError> {
        let mut program = DrawableProgram::new(*coordinate_system);
        for (label, corner) in self.corners() {
            program.comment(&format!("\nDrawing {} corner", label));
            program.append(corner.draw_on(coordinate_system)?);
        }
        Ok(program)
    }
}

/// Solid block hatched layer by layer.
///
/// `width` extends along x and `length` along y from `bottom_left`. Even layers are
/// hatched with lines along x, odd layers with lines along y, each layer as a
/// serpentine. With an `acceleration`, every line gets a run-in and run-out of
/// `velocity² / (2 · acceleration)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rectangle3D {
    pub bottom_left: Point3D,
    pub width: f64,
    pub length: f64,
    pub height: f64,
    pub hatch_size: f64,
    pub layer_height: f64,
    pub velocity: f64,
    #[serde(default)]
    pub acceleration: Option<f64>,
}

impl Rectangle3D {
    /// Hatch lines (start, end) of one layer
    pub fn layer_lines(&self, layer: usize, z: f64) -> Result<Vec<(Point3D, Point3D)>, DomainError> {
        let origin = self.bottom_left + Point3D::new(0.0, 0.0, z);
        let along_x = layer % 2 == 0;
        let (line_length, spread) = if along_x {
            (self.width, self.length)
        } else {
            (self.length, self.width)
        };
        let count = slice_count(spread, self.hatch_size, "Hatch size")?;
        let hatch = if count == 0 { 0.0 } else { spread / count as f64 };

        Ok((0..=count)
            .map(|j| {
                let offset = j as f64 * hatch;
                let (from, to) = if j % 2 == 0 {
                    (0.0, line_length)
                } else {
                    (line_length, 0.0)
                };
                if along_x {
                    (
                        origin + Point2D::new(from, offset),
                        origin + Point2D::new(to, offset),
                    )
                } else {
                    (
                        origin + Point2D::new(offset, from),
                        origin + Point2D::new(offset, to),
                    )
                }
            })
            .collect())
    }
}

impl Drawable for Rectangle3D {
    fn center_point(&self) -> Point3D {
        self.bottom_left + Point2D::new(self.width / 2.0, self.length / 2.0)
    }

    fn draw_on(&self, coordinate_system: &CoordinateSystem) -> Result<DrawableProgram, DomainError> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.width) || !positive(self.length) || !positive(self.velocity) {
            return Err(DomainError::Geometry(format!(
                "Rectangle needs positive width, length and velocity (got {}, {}, {})",
                self.width, self.length, self.velocity
            )));
        }
        let run_distance = match self.acceleration {
            Some(a) if a > 0.0 => self.velocity * self.velocity / (2.0 * a),
            Some(a) => {
                return Err(DomainError::Geometry(format!(
                    "Acceleration must be positive, got {}",
                    a
                )))
            }
            None => 0.0,
        };

        let layers = slice_count(self.height, self.layer_height, "Layer height")?.max(1);
        let layer_height = self.height / layers as f64;
        let feed = Some(Feed::Dependent(self.velocity));

        let mut program = DrawableProgram::new(*coordinate_system);
        for layer in 0..layers {
            let z = layer as f64 * layer_height;
            program.comment(&format!("\nLayer {} at z={:.4}", layer, z));
            for (start, end) in self.layer_lines(layer, z)? {
                let length = start.distance(end);
                let unit = if length > EPS {
                    (end - start) * (1.0 / length)
                } else {
                    Point3D::default()
                };
                if run_distance > 0.0 {
                    program.linear_to(start - unit * run_distance, feed);
                }
                program.linear_to(start, feed);
                program.laser(true)?;
                program.linear_to(end, feed);
                program.laser(false)?;
                if run_distance > 0.0 {
                    program.linear_to(end + unit * run_distance, feed);
                }
            }
        }
        Ok(program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commands(program: &DrawableProgram) -> Vec<String> {
        program
            .program()
            .iter()
            .filter(|l| !l.is_empty() && !l.starts_with('\''))
            .cloned()
            .collect()
    }

    #[test]
    fn test_single_line() {
        let line = SingleLine::new(
            Point3D::new(0.0, 0.0, 0.0),
            Point3D::new(2.0, 0.0, 0.0),
            FeedRate::dependent(1.0),
        );
        let program = line.draw_on(&CoordinateSystem::default()).unwrap();
        assert_eq!(
            commands(&program),
            vec![
                "LINEAR X0.0000000000 Y0.0000000000 Z0.0000000000 F1.000000",
                "GALVO LASEROVERRIDE A ON",
                "LINEAR X2.0000000000 Y0.0000000000 Z0.0000000000 F1.000000",
                "GALVO LASEROVERRIDE A OFF",
            ]
        );
        assert_eq!(line.center_point(), Point3D::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_x_lines_run_in_and_out() {
        let lines = XLines::new(1.0, 0.0, vec![(0.0, 1.0), (2.0, 3.0)], 2.0, 4.0).unwrap();
        let program = lines.draw_on(&CoordinateSystem::default()).unwrap();
        let cmds = commands(&program);
        // run distance v^2 / 2a = 0.5
        assert_eq!(cmds[0], "LINEAR X-0.5000000000 Y1.0000000000 Z0.0000000000 F2.000000");
        assert_eq!(
            cmds.last().unwrap(),
            "LINEAR X3.5000000000 Y1.0000000000 Z0.0000000000 F2.000000"
        );
        assert_eq!(cmds.len(), 2 + 2 * 4);
        assert_eq!(lines.center_point(), Point3D::new(1.5, 1.0, 0.0));
    }

    #[test]
    fn test_line_direction_mismatch() {
        let err = YLines::new(0.0, 0.0, vec![(0.0, 1.0), (3.0, 2.0)], 1.0, 1.0).unwrap_err();
        assert!(err.to_string().contains("Direction mismatch"));
        assert!(XLines::new(0.0, 0.0, vec![], 1.0, 1.0).is_err());
    }

    #[test]
    fn test_poly_lines_comment_each_line() {
        let lines = PolyLines::new(
            vec![
                vec![Point3D::new(0.0, 0.0, 0.0), Point3D::new(1.0, 0.0, 0.0)],
                vec![Point3D::new(0.0, 2.0, 0.0), Point3D::new(1.0, 2.0, 1.0)],
            ],
            FeedRate::default(),
        );
        let program = lines.draw_on(&CoordinateSystem::default()).unwrap();
        let text = program.program().to_text();
        assert!(text.contains("' [Polyline] - Draw line 0:"));
        assert!(text.contains("' [Polyline] - Draw line 1:"));
        assert_eq!(lines.center_point(), Point3D::new(0.5, 1.0, 0.5));
        assert!(PolyLine::new(vec![], FeedRate::default())
            .draw_on(&CoordinateSystem::default())
            .is_err());
    }

    #[test]
    fn test_vertical_line() {
        let line = VerticalLine {
            position: Point2D::new(1.0, 2.0),
            z_min: -1.0,
            z_max: 3.0,
            feed: FeedRate::default(),
        };
        let cmds = commands(&line.draw_on(&CoordinateSystem::default()).unwrap());
        assert_eq!(cmds[0], "LINEAR X1.0000000000 Y2.0000000000 Z-1.0000000000");
        assert_eq!(cmds[2], "LINEAR X1.0000000000 Y2.0000000000 Z3.0000000000");
    }

    #[test]
    fn test_corner_hatching_and_layers() {
        let corner = Corner::new(Point3D::new(0.0, 0.0, -2.0), 300.0, 20.0, 7.0);
        let (n, hatch) = corner.hatching().unwrap();
        assert_eq!(n, 41);
        assert!((hatch - 0.5).abs() < 1e-12);

        let program = corner.draw_on(&CoordinateSystem::default()).unwrap();
        let laser_on = program
            .program()
            .iter()
            .filter(|l| l.as_str() == "GALVO LASEROVERRIDE A ON")
            .count();
        // 10 layers of 41 lines
        assert_eq!(laser_on, 410);
    }

    #[test]
    fn test_corner_too_narrow_for_hatch() {
        let corner = Corner::new(Point3D::default(), 1.0, 0.2, 0.5).with_hatching(0.5, 0.75);
        assert!(matches!(corner.hatching(), Err(DomainError::Geometry(_))));
        assert!(corner.draw_on(&CoordinateSystem::default()).is_err());

        let corner = Corner::new(Point3D::default(), 1.0, 0.2, 0.5).with_hatching(f64::NAN, 0.75);
        assert!(corner.hatching().is_err());

        let rect = CornerRectangle {
            center: Point3D::default(),
            rectangle_width: 10.0,
            rectangle_height: 10.0,
            corner_length: 1.0,
            corner_width: 0.2,
            height: 0.5,
            layer_height: 0.75,
            hatch_size: 0.5,
            feed: FeedRate::default(),
        };
        assert!(rect.draw_on(&CoordinateSystem::default()).is_err());
    }

    #[test]
    fn test_corner_alternates_start_side() {
        let corner = Corner::new(Point3D::default(), 10.0, 1.0, 1.5).with_hatching(1.0, 0.75);
        let (n, hatch) = corner.hatching().unwrap();
        let first = corner.single_layer(Point3D::default(), n, hatch, false);
        let second = corner.single_layer(Point3D::default(), n, hatch, true);
        let mut reversed = second.lines[0].clone();
        reversed.reverse();
        assert_eq!(first.lines[0], reversed);
        // p1 at the end of the x arm: (length - width / 2, n / 2 * hatch)
        assert_eq!(first.lines[0][0], Point3D::new(9.5, 1.0, 0.0));
    }

    #[test]
    fn test_corner_center_point_rotation() {
        let corner = Corner::new(Point3D::default(), 10.0, 2.0, 1.0).with_rotation(90.0);
        let center = corner.center_point();
        assert!((center.x + 4.0).abs() < 1e-9);
        assert!((center.y - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_corner_rectangle_order() {
        let rect = CornerRectangle {
            center: Point3D::default(),
            rectangle_width: 1000.0,
            rectangle_height: 1000.0,
            corner_length: 300.0,
            corner_width: 20.0,
            height: 0.5,
            layer_height: 0.75,
            hatch_size: 0.5,
            feed: FeedRate::dependent(2000.0),
        };
        let corners = rect.corners();
        assert_eq!(corners[1].1.corner_center, Point3D::new(500.0, -500.0, 0.0));
        assert_eq!(corners[2].1.rotation_degree, 180.0);
        let text = rect.draw_on(&CoordinateSystem::default()).unwrap().program().to_text();
        let tl = text.find("Drawing Top Left corner").unwrap();
        let tr = text.find("Drawing Top Right corner").unwrap();
        let br = text.find("Drawing Bottom Right corner").unwrap();
        let bl = text.find("Drawing Bottom Left corner").unwrap();
        assert!(tl < tr && tr < br && br < bl);
    }

    #[test]
    fn test_rectangle_layers_alternate() {
        let rect = Rectangle3D {
            bottom_left: Point3D::default(),
            width: 2.0,
            length: 1.0,
            height: 1.0,
            hatch_size: 0.5,
            layer_height: 0.5,
            velocity: 1.0,
            acceleration: None,
        };
        let first = rect.layer_lines(0, 0.0).unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(first[0], (Point3D::new(0.0, 0.0, 0.0), Point3D::new(2.0, 0.0, 0.0)));
        assert_eq!(first[1], (Point3D::new(2.0, 0.5, 0.0), Point3D::new(0.0, 0.5, 0.0)));
        let second = rect.layer_lines(1, 0.5).unwrap();
        assert_eq!(second.len(), 5);
        assert_eq!(second[0], (Point3D::new(0.0, 0.0, 0.5), Point3D::new(0.0, 1.0, 0.5)));

        let program = rect.draw_on(&CoordinateSystem::default()).unwrap();
        let exposures = program
            .program()
            .iter()
            .filter(|l| l.as_str() == "GALVO LASEROVERRIDE A ON")
            .count();
        assert_eq!(exposures, 8);
    }

    #[test]
    fn test_rectangle_rejects_nan_size() {
        let rect = Rectangle3D {
            bottom_left: Point3D::default(),
            width: f64::NAN,
            length: 1.0,
            height: 0.5,
            hatch_size: 0.5,
            layer_height: 0.5,
            velocity: 1.0,
            acceleration: None,
        };
        assert!(rect.draw_on(&CoordinateSystem::default()).is_err());
    }

    #[test]
    fn test_rectangle_run_in() {
        let rect = Rectangle3D {
            bottom_left: Point3D::default(),
            width: 1.0,
            length: 1.0,
            height: 0.5,
            hatch_size: 1.0,
            layer_height: 0.5,
            velocity: 1.0,
            acceleration: Some(1.0),
        };
        let cmds = commands(&rect.draw_on(&CoordinateSystem::default()).unwrap());
        assert_eq!(cmds[0], "LINEAR X-0.5000000000 Y0.0000000000 Z0.0000000000 F1.000000");
        assert_eq!(cmds[5], "LINEAR X1.5000000000 Y0.0000000000 Z0.0000000000 F1.000000");
    }
}
