//! Tool path extraction from AeroBasic text
//!
//! Follows LINEAR, CW and CCW moves of the X/Y/Z stage together with the galvo
//! laser override so a generated program can be checked without a controller.

use std::f64::consts::TAU;
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::domain::constants::CircleDirection;
use crate::domain::errors::DomainError;
use crate::domain::geometry::Point3D;

/// One move of the tool path
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Movement {
    Linear {
        start: Point3D,
        end: Point3D,
        laser_on: bool,
        feed: Option<f64>,
    },
    Arc {
        direction: CircleDirection,
        center: Point3D,
        start: Point3D,
        end: Point3D,
        laser_on: bool,
        feed: Option<f64>,
    },
}

impl Movement {
    pub fn laser_on(&self) -> bool {
        match self {
            Movement::Linear { laser_on, .. } | Movement::Arc { laser_on, .. } => *laser_on,
        }
    }

    pub fn start(&self) -> Point3D {
        match self {
            Movement::Linear { start, .. } | Movement::Arc { start, .. } => *start,
        }
    }

    pub fn end(&self) -> Point3D {
        match self {
            Movement::Linear { end, .. } | Movement::Arc { end, .. } => *end,
        }
    }

    pub fn feed(&self) -> Option<f64> {
        match self {
            Movement::Linear { feed, .. } | Movement::Arc { feed, .. } => *feed,
        }
    }

    /// Swept angle of an arc in radians, a closed arc counts as a full turn
    pub fn sweep(&self) -> Option<f64> {
        let Movement::Arc {
            direction,
            center,
            start,
            end,
            ..
        } = self
        else {
            return None;
        };
        let start_angle = (start.y - center.y).atan2(start.x - center.x);
        let end_angle = (end.y - center.y).atan2(end.x - center.x);
        let sweep = match direction {
            CircleDirection::Clockwise => start_angle - end_angle,
            CircleDirection::CounterClockwise => end_angle - start_angle,
        };
        Some(if sweep <= 1e-12 { sweep + TAU } else { sweep })
    }

    /// Path length of the move
    pub fn length(&self) -> f64 {
        match self {
            Movement::Linear { start, end, .. } => start.distance(*end),
            Movement::Arc {
                center, start, end, ..
            } => {
                let radius = start.xy().distance(center.xy());
                let planar = radius * self.sweep().unwrap_or(0.0);
                planar.hypot(end.z - start.z)
            }
        }
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub min: Point3D,
    pub max: Point3D,
}

impl BoundingBox {
    fn from_point(p: Point3D) -> Self {
        Self { min: p, max: p }
    }

    fn include(&mut self, p: Point3D) {
        self.min = Point3D::new(self.min.x.min(p.x), self.min.y.min(p.y), self.min.z.min(p.z));
        self.max = Point3D::new(self.max.x.max(p.x), self.max.y.max(p.y), self.max.z.max(p.z));
    }
}

/// Aggregated numbers of a tool path
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceSummary {
    pub linear_moves: usize,
    pub arc_moves: usize,
    pub exposed_moves: usize,
    pub exposed_length: f64,
    pub travel_length: f64,
    /// Duration of moves with a known feed rate
    pub estimated_seconds: f64,
    pub exposed_bounds: Option<BoundingBox>,
}

impl TraceSummary {
    pub fn from_movements(movements: &[Movement]) -> Self {
        let mut summary = TraceSummary {
            linear_moves: 0,
            arc_moves: 0,
            exposed_moves: 0,
            exposed_length: 0.0,
            travel_length: 0.0,
            estimated_seconds: 0.0,
            exposed_bounds: None,
        };

        for movement in movements {
            match movement {
                Movement::Linear { .. } => summary.linear_moves += 1,
                Movement::Arc { .. } => summary.arc_moves += 1,
            }
            let length = movement.length();
            if let Some(feed) = movement.feed().filter(|f| *f > 0.0) {
                summary.estimated_seconds += length / feed;
            }
            if movement.laser_on() {
                summary.exposed_moves += 1;
                summary.exposed_length += length;
                let bounds = summary
                    .exposed_bounds
                    .get_or_insert_with(|| BoundingBox::from_point(movement.start()));
                bounds.include(movement.start());
                bounds.include(movement.end());
                if let Movement::Arc { center, start, .. } = movement {
                    // Full circles reach beyond their end points
                    let r = start.xy().distance(center.xy());
                    bounds.include(Point3D::new(center.x - r, center.y - r, start.z));
                    bounds.include(Point3D::new(center.x + r, center.y + r, start.z));
                }
            } else {
                summary.travel_length += length;
            }
        }
        summary
    }
}

impl fmt::Display for TraceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Moves: {} linear, {} arcs ({} exposed)",
            self.linear_moves, self.arc_moves, self.exposed_moves
        )?;
        writeln!(f, "Exposed path: {:.4} mm", self.exposed_length)?;
        writeln!(f, "Travel path:  {:.4} mm", self.travel_length)?;
        write!(f, "Estimated time: {:.1} s", self.estimated_seconds)?;
        if let Some(bounds) = &self.exposed_bounds {
            write!(
                f,
                "\nExposed bounds: X {:.4}..{:.4}, Y {:.4}..{:.4}, Z {:.4}..{:.4}",
                bounds.min.x, bounds.max.x, bounds.min.y, bounds.max.y, bounds.min.z, bounds.max.z
            )?;
        }
        Ok(())
    }
}

#[derive(Default)]
struct ToolState {
    position: [Option<f64>; 3],
    incremental: bool,
    laser_on: bool,
    feed: Option<f64>,
}

impl ToolState {
    fn point(&self) -> Option<Point3D> {
        match self.position {
            [Some(x), Some(y), Some(z)] => Some(Point3D::new(x, y, z)),
            _ => None,
        }
    }

    fn target(&self, slot: usize, value: f64) -> f64 {
        match (self.incremental, self.position[slot]) {
            (true, Some(current)) => current + value,
            _ => value,
        }
    }
}

fn split_word(word: &str, line: &str) -> Result<(char, f64), DomainError> {
    let mut chars = word.chars();
    let letter = chars
        .next()
        .ok_or_else(|| DomainError::BadArgs(format!("Empty argument in '{}'", line)))?;
    let value = chars.as_str().parse::<f64>().map_err(|_| {
        DomainError::BadArgs(format!("Cannot parse argument '{}' in '{}'", word, line))
    })?;
    Ok((letter.to_ascii_uppercase(), value))
}

fn slot_of(letter: char) -> Option<usize> {
    match letter {
        'X' => Some(0),
        'Y' => Some(1),
        'Z' => Some(2),
        _ => None,
    }
}

/// Extract the tool path of a program.
///
/// Moves starting from a position that is not fully known yet are not reported.
pub fn read_text(text: &str) -> Result<Vec<Movement>, DomainError> {
    let mut state = ToolState::default();
    let mut movements = Vec::new();

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('\'') {
            continue;
        }

        let mut words = line.split_whitespace();
        let Some(op) = words.next() else { continue };
        match op {
            "ABSOLUTE" => state.incremental = false,
            "INCREMENTAL" => state.incremental = true,
            "GALVO" if line.starts_with("GALVO LASEROVERRIDE") => {
                if line.ends_with(" ON") {
                    state.laser_on = true;
                } else if line.ends_with(" OFF") {
                    state.laser_on = false;
                }
            }
            "LINEAR" => {
                let start = state.point();
                let mut next = state.position;
                for word in words {
                    let (letter, value) = split_word(word, line)?;
                    match letter {
                        'F' => state.feed = Some(value),
                        'E' => {}
                        _ => match slot_of(letter) {
                            Some(slot) => next[slot] = Some(state.target(slot, value)),
                            None => debug!(axis = %letter, "Skipping axis outside the XYZ stage"),
                        },
                    }
                }
                state.position = next;
                if let (Some(start), Some(end)) = (start, state.point()) {
                    movements.push(Movement::Linear {
                        start,
                        end,
                        laser_on: state.laser_on,
                        feed: state.feed,
                    });
                }
            }
            "CW" | "CCW" => {
                let direction = if op == "CW" {
                    CircleDirection::Clockwise
                } else {
                    CircleDirection::CounterClockwise
                };
                let start = state.point();
                let mut next = state.position;
                let mut arc_axes: Vec<usize> = Vec::with_capacity(2);
                let mut centers: [Option<f64>; 2] = [None, None];
                let mut has_radius = false;

                for word in words {
                    let (letter, value) = split_word(word, line)?;
                    match letter {
                        'I' => centers[0] = Some(value),
                        'J' => centers[1] = Some(value),
                        'R' => has_radius = true,
                        'F' => state.feed = Some(value),
                        _ => match slot_of(letter) {
                            Some(slot) => {
                                arc_axes.push(slot);
                                next[slot] = Some(state.target(slot, value));
                            }
                            None => debug!(axis = %letter, "Skipping axis outside the XYZ stage"),
                        },
                    }
                }
                state.position = next;

                if has_radius {
                    debug!(line, "Arc with radius is not traced");
                    continue;
                }
                if let (Some(start), Some(end)) = (start, state.point()) {
                    let mut center = start;
                    for (index, slot) in arc_axes.iter().take(2).enumerate() {
                        if let Some(value) = centers[index] {
                            match slot {
                                0 => center.x = value,
                                1 => center.y = value,
                                _ => center.z = value,
                            }
                        }
                    }
                    movements.push(Movement::Arc {
                        direction,
                        center,
                        start,
                        end,
                        laser_on: state.laser_on,
                        feed: state.feed,
                    });
                }
            }
            _ => {}
        }
    }

    Ok(movements)
}
