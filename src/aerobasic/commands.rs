//! AeroBasic command text builders
//!
//! Every builder returns a single command line without terminator. Builders that can
//! be called with arguments the controller would refuse validate them and return a
//! [`DomainError`] instead.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::axis::Axis;
use crate::domain::constants::{
    AxisStatusDataItem, BezierMode, CircleDirection, DataItem, GalvoLaserOverrideMode,
    ProgrammingMode, SystemStatusDataItem, TaskStatusDataItem, VelocityMode, VelocityUnit,
    WaitMode, MAX_NUMBER_OF_TASKS,
};
use crate::domain::errors::DomainError;
use crate::domain::geometry::Coordinates;

/// Upper bound the controller accepts for DWELL (seconds)
pub const MAX_DWELL_SECONDS: f64 = 4.29e6;

/// Feed rate of a coordinated move
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feed {
    /// Vectorial feed rate of the dependent axes (F)
    Dependent(f64),
    /// Feed rate of the independent axes (E)
    Independent(f64),
}

impl Feed {
    /// Build from optional F and E values; both at once is not allowed
    pub fn from_parts(f: Option<f64>, e: Option<f64>) -> Result<Option<Feed>, DomainError> {
        match (f, e) {
            (Some(f), Some(e)) => Err(DomainError::InvalidCommand(format!(
                "Cannot specify dependent and independent velocity at the same time (E={}, F={})",
                e, f
            ))),
            (Some(f), None) => Ok(Some(Feed::Dependent(f))),
            (None, Some(e)) => Ok(Some(Feed::Independent(e))),
            (None, None) => Ok(None),
        }
    }

    pub fn value(self) -> f64 {
        match self {
            Feed::Dependent(v) | Feed::Independent(v) => v,
        }
    }

    pub fn scaled(self, factor: f64) -> Feed {
        match self {
            Feed::Dependent(v) => Feed::Dependent(v * factor),
            Feed::Independent(v) => Feed::Independent(v * factor),
        }
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feed::Dependent(v) => write!(f, "F{:.6}", v),
            Feed::Independent(v) => write!(f, "E{:.6}", v),
        }
    }
}

/// Circular move in the plane of two axes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcMove {
    pub axis1: Axis,
    pub axis1_endpoint: f64,
    pub axis2: Axis,
    pub axis2_endpoint: f64,
    pub radius: Option<f64>,
    pub axis1_center: Option<f64>,
    pub axis2_center: Option<f64>,
    pub velocity: Option<f64>,
}

impl ArcMove {
    /// Arc described by its centre
    pub fn with_center(
        (axis1, axis1_endpoint, axis1_center): (Axis, f64, f64),
        (axis2, axis2_endpoint, axis2_center): (Axis, f64, f64),
        velocity: Option<f64>,
    ) -> Self {
        Self {
            axis1,
            axis1_endpoint,
            axis2,
            axis2_endpoint,
            radius: None,
            axis1_center: Some(axis1_center),
            axis2_center: Some(axis2_center),
            velocity,
        }
    }

    /// Arc described by its radius
    pub fn with_radius(
        (axis1, axis1_endpoint): (Axis, f64),
        (axis2, axis2_endpoint): (Axis, f64),
        radius: f64,
        velocity: Option<f64>,
    ) -> Self {
        Self {
            axis1,
            axis1_endpoint,
            axis2,
            axis2_endpoint,
            radius: Some(radius),
            axis1_center: None,
            axis2_center: None,
            velocity,
        }
    }
}

/// Quadratic or cubic Bezier curve in the plane of two axes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BezierCurve {
    pub mode: BezierMode,
    pub axis_h: Axis,
    pub axis_v: Axis,
    pub points_h: [f64; 3],
    pub p3_h: Option<f64>,
    pub points_v: [f64; 3],
    pub p3_v: Option<f64>,
    pub tolerance: Option<f64>,
}

/// One `(target, item)` tuple of a `~STATUS` query
#[derive(Debug, Clone, PartialEq)]
pub struct StatusQuery {
    target: Option<String>,
    item: &'static str,
}

impl StatusQuery {
    pub fn axis(axis: Axis, item: AxisStatusDataItem) -> Result<Self, DomainError> {
        axis.require_single("STATUS axis query")?;
        Ok(Self {
            target: Some(axis.parameter_name()),
            item: item.name(),
        })
    }

    pub fn task(task_id: u8, item: TaskStatusDataItem) -> Result<Self, DomainError> {
        validate_task_id(task_id)?;
        Ok(Self {
            target: Some(task_id.to_string()),
            item: item.name(),
        })
    }

    pub fn system(item: SystemStatusDataItem) -> Self {
        Self {
            target: None,
            item: item.name(),
        }
    }
}

impl fmt::Display for StatusQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Some(target) => write!(f, "({}, {})", target, self.item),
            None => write!(f, "({})", self.item),
        }
    }
}

pub fn validate_task_id(task_id: u8) -> Result<u8, DomainError> {
    if task_id < MAX_NUMBER_OF_TASKS {
        Ok(task_id)
    } else {
        Err(DomainError::BadArgs(format!(
            "Task id must be below {} (got {})",
            MAX_NUMBER_OF_TASKS, task_id
        )))
    }
}

fn extra(additional_data: Option<&str>) -> String {
    additional_data
        .map(|data| format!(", {}", data))
        .unwrap_or_default()
}

// Functions

pub fn acknowledge_all() -> String {
    "ACKNOWLEDGEALL".to_string()
}

pub fn error_decode(error_code: i64, error_location: i64) -> String {
    format!("ERRORDECODE {}, {}", error_code, error_location)
}

pub fn programming_mode(mode: ProgrammingMode) -> String {
    mode.as_str().to_string()
}

pub fn velocity_unit(unit: VelocityUnit) -> String {
    unit.as_str().to_string()
}

pub fn enable(axes: Axis) -> String {
    format!("ENABLE {}", axes.parameter_name())
}

pub fn disable(axes: Axis) -> String {
    format!("DISABLE {}", axes.parameter_name())
}

pub fn abort(axes: Axis) -> String {
    format!("ABORT {}", axes.parameter_name())
}

pub fn velocity(mode: VelocityMode) -> String {
    format!("VELOCITY {}", mode)
}

pub fn wait_mode(mode: WaitMode) -> String {
    format!("WAIT MODE {}", mode)
}

/// Pause execution, duration in seconds
pub fn dwell(duration: f64) -> Result<String, DomainError> {
    if !(duration > 0.0 && duration < MAX_DWELL_SECONDS) {
        return Err(DomainError::InvalidCommand(format!(
            "DWELL duration must be in (0, {}) seconds, got {}",
            MAX_DWELL_SECONDS, duration
        )));
    }
    Ok(format!("DWELL {:.3}", duration))
}

pub fn home(axes: Axis, conditional: bool) -> String {
    let mut cmd = format!("HOME {}", axes.parameter_name());
    if conditional {
        cmd.push_str(" CONDITIONAL");
    }
    cmd
}

pub fn axis_status(
    axis: Axis,
    item: AxisStatusDataItem,
    additional_data: Option<&str>,
) -> Result<String, DomainError> {
    axis.require_single("AXISSTATUS")?;
    Ok(format!(
        "AXISSTATUS({}, {}{})",
        axis.parameter_name(),
        item.as_dataitem(),
        extra(additional_data)
    ))
}

pub fn system_status(item: SystemStatusDataItem, additional_data: Option<&str>) -> String {
    format!("SYSTEMSTATUS({}{})", item.as_dataitem(), extra(additional_data))
}

pub fn task_status(
    task_id: Option<u8>,
    item: TaskStatusDataItem,
    additional_data: Option<&str>,
) -> Result<String, DomainError> {
    let task = match task_id {
        Some(id) => format!("{}, ", validate_task_id(id)?),
        None => String::new(),
    };
    Ok(format!(
        "TASKSTATUS({}{}{})",
        task,
        item.as_dataitem(),
        extra(additional_data)
    ))
}

/// Load a program file into a task; relative paths are resolved against the working directory
pub fn program_load(task_id: u8, program_path: &Path) -> Result<String, DomainError> {
    validate_task_id(task_id)?;
    let absolute = if program_path.is_absolute() {
        program_path.to_path_buf()
    } else {
        std::env::current_dir()?.join(program_path)
    };
    Ok(format!(
        "PROGRAM {} LOAD \"{}\"",
        task_id,
        absolute.display()
    ))
}

pub fn program_start(task_id: u8) -> Result<String, DomainError> {
    Ok(format!("PROGRAM {} START", validate_task_id(task_id)?))
}

pub fn program_stop(task_id: u8) -> Result<String, DomainError> {
    Ok(format!("PROGRAM {} STOP", validate_task_id(task_id)?))
}

pub fn apply_defaults_axis(axes: Axis) -> String {
    format!("APPLYDEFAULTS AXIS {}", axes.parameter_name())
}

pub fn apply_defaults_task(task_id: Option<u8>) -> Result<String, DomainError> {
    match task_id {
        Some(id) => Ok(format!("APPLYDEFAULTS TASK {}", validate_task_id(id)?)),
        None => Ok("APPLYDEFAULTS TASK".to_string()),
    }
}

// Synchronous movements

/// Coordinated linear move
pub fn linear(coordinates: &Coordinates, feed: Option<Feed>) -> String {
    let mut cmd = String::from("LINEAR");
    for (axis, value) in coordinates.iter() {
        cmd.push_str(&format!(" {}{:.10}", axis.parameter_name(), value));
    }
    if let Some(feed) = feed {
        cmd.push_str(&format!(" {}", feed));
    }
    cmd
}

/// Circular move, clockwise or counter-clockwise
pub fn circle(direction: CircleDirection, arc: &ArcMove) -> Result<String, DomainError> {
    arc.axis1.require_single("axis1")?;
    arc.axis2.require_single("axis2")?;

    let mut cmd = format!(
        "{} {}{:.10} {}{:.10}",
        direction,
        arc.axis1.parameter_name(),
        arc.axis1_endpoint,
        arc.axis2.parameter_name(),
        arc.axis2_endpoint
    );

    match (arc.radius, arc.axis1_center, arc.axis2_center) {
        (Some(radius), None, None) => cmd.push_str(&format!(" R{:.10}", radius)),
        (None, Some(c1), Some(c2)) => cmd.push_str(&format!(" I{:.10} J{:.10}", c1, c2)),
        (radius, c1, c2) => {
            return Err(DomainError::InvalidCommand(format!(
                "Arc needs either a radius or both centres, got radius={:?}, axis1_center={:?}, axis2_center={:?}",
                radius, c1, c2
            )))
        }
    }

    if let Some(velocity) = arc.velocity {
        cmd.push_str(&format!(" F{:.6}", velocity));
    }
    Ok(cmd)
}

pub fn bezier(curve: &BezierCurve) -> Result<String, DomainError> {
    curve.axis_h.require_single("BEZIER horizontal axis")?;
    curve.axis_v.require_single("BEZIER vertical axis")?;
    if curve.p3_h.is_some() != curve.p3_v.is_some() {
        return Err(DomainError::InvalidCommand(format!(
            "Either set both p3_h and p3_v or none (p3_h={:?}, p3_v={:?})",
            curve.p3_h, curve.p3_v
        )));
    }
    match (curve.mode, curve.p3_h.is_some()) {
        (BezierMode::Cubic, false) => {
            return Err(DomainError::InvalidCommand(
                "CUBIC Bezier curves need a fourth control point".to_string(),
            ))
        }
        (BezierMode::Quadratic, true) => {
            return Err(DomainError::InvalidCommand(
                "QUADRATIC Bezier curves take three control points".to_string(),
            ))
        }
        _ => {}
    }

    let axis_string = |axis: Axis, points: &[f64; 3], p3: Option<f64>| {
        let mut s = format!(
            "{}, {}, {}, {}",
            axis.parameter_name(),
            points[0],
            points[1],
            points[2]
        );
        if let Some(p3) = p3 {
            s.push_str(&format!(", {}", p3));
        }
        s
    };

    let mut cmd = format!(
        "BEZIER {} {}, {}",
        curve.mode,
        axis_string(curve.axis_h, &curve.points_h, curve.p3_h),
        axis_string(curve.axis_v, &curve.points_v, curve.p3_v)
    );
    if let Some(tolerance) = curve.tolerance {
        cmd.push_str(&format!(" TOLERANCE {}", tolerance));
    }
    Ok(cmd)
}

// Asynchronous movements

/// Free-running move at constant velocity; `None` stops the axis
pub fn freerun(axis: Axis, velocity: Option<f64>) -> Result<String, DomainError> {
    axis.require_single("FREERUN")?;
    Ok(match velocity {
        Some(v) => format!("FREERUN {} {}", axis.parameter_name(), v),
        None => format!("FREERUN {} STOP", axis.parameter_name()),
    })
}

pub fn move_abs(axis: Axis, position: f64, speed: f64) -> Result<String, DomainError> {
    axis.require_single("MOVEABS")?;
    Ok(format!("MOVEABS {} {} {}", axis.parameter_name(), position, speed))
}

pub fn move_inc(axis: Axis, distance: f64, speed: f64) -> Result<String, DomainError> {
    axis.require_single("MOVEINC")?;
    Ok(format!("MOVEINC {} {} {}", axis.parameter_name(), distance, speed))
}

pub fn oscillate(
    axis: Axis,
    distance: f64,
    frequency: f64,
    cycles: u32,
    num_iterations: u32,
) -> Result<String, DomainError> {
    axis.require_single("OSCILLATE")?;
    Ok(format!(
        "OSCILLATE {}, {}, {}, {}, {}",
        axis.parameter_name(),
        distance,
        frequency,
        cycles,
        num_iterations
    ))
}

// Galvo

pub fn galvo_laser_override(axis: Axis, mode: GalvoLaserOverrideMode) -> Result<String, DomainError> {
    if !(axis.is_single_axis() && Axis::AB.contains(axis)) {
        return Err(DomainError::Axis(format!(
            "Galvo laser override needs axis A or B (got '{}')",
            axis
        )));
    }
    Ok(format!("GALVO LASEROVERRIDE {} {}", axis.parameter_name(), mode))
}

/// IFOV look-ahead time in milliseconds, must be a multiple of 5
pub fn ifov_time(search_time_ms: u32) -> Result<String, DomainError> {
    if search_time_ms % 5 != 0 {
        return Err(DomainError::InvalidCommand(format!(
            "IFOV search time is not divisible by 5ms ({})",
            search_time_ms
        )));
    }
    Ok(format!("IFOV TIME {}", search_time_ms))
}

// ASCII interface system commands

pub fn last_error() -> String {
    "~LASTERROR".to_string()
}

pub fn version() -> String {
    "~VERSION".to_string()
}

pub fn reset_controller() -> String {
    "~RESETCONTROLLER".to_string()
}

pub fn task(task_id: u8) -> Result<String, DomainError> {
    Ok(format!("~TASK {}", validate_task_id(task_id)?))
}

pub fn stop_task(task_id: Option<u8>) -> Result<String, DomainError> {
    match task_id {
        Some(id) => Ok(format!("~STOPTASK {}", validate_task_id(id)?)),
        None => Ok("~STOPTASK".to_string()),
    }
}

pub fn status(queries: &[StatusQuery]) -> Result<String, DomainError> {
    if queries.is_empty() {
        return Err(DomainError::InvalidCommand(
            "~STATUS needs at least one query".to_string(),
        ));
    }
    let query_string = queries
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    Ok(format!("~STATUS {}", query_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_commands() {
        assert_eq!(enable(Axis::XY), "ENABLE X Y");
        assert_eq!(disable(Axis::Z), "DISABLE Z");
        assert_eq!(abort(Axis::AB), "ABORT A B");
        assert_eq!(home(Axis::YZ | Axis::AB, false), "HOME Y Z A B");
        assert_eq!(home(Axis::X, true), "HOME X CONDITIONAL");
        assert_eq!(apply_defaults_axis(Axis::XYZ), "APPLYDEFAULTS AXIS X Y Z");
    }

    #[test]
    fn test_mode_commands() {
        assert_eq!(velocity(VelocityMode::On), "VELOCITY ON");
        assert_eq!(wait_mode(WaitMode::InPosition), "WAIT MODE INPOS");
        assert_eq!(programming_mode(ProgrammingMode::Incremental), "INCREMENTAL");
        assert_eq!(error_decode(3, 12), "ERRORDECODE 3, 12");
    }

    #[test]
    fn test_dwell_bounds() {
        assert_eq!(dwell(1.5).unwrap(), "DWELL 1.500");
        assert!(dwell(0.0).is_err());
        assert!(dwell(5e6).is_err());
    }

    #[test]
    fn test_status_functions() {
        assert_eq!(
            axis_status(Axis::X, AxisStatusDataItem::DriveStatus, None).unwrap(),
            "AXISSTATUS(X, DATAITEM_DriveStatus)"
        );
        assert!(axis_status(Axis::XY, AxisStatusDataItem::DriveStatus, None).is_err());
        assert_eq!(
            system_status(SystemStatusDataItem::Timer, Some("1")),
            "SYSTEMSTATUS(DATAITEM_Timer, 1)"
        );
        assert_eq!(
            task_status(Some(2), TaskStatusDataItem::TaskState, None).unwrap(),
            "TASKSTATUS(2, DATAITEM_TaskState)"
        );
        assert_eq!(
            task_status(None, TaskStatusDataItem::TaskMode, None).unwrap(),
            "TASKSTATUS(DATAITEM_TaskMode)"
        );
        assert!(task_status(Some(32), TaskStatusDataItem::TaskMode, None).is_err());
    }

    #[test]
    fn test_program_commands() {
        let cmd = program_load(2, Path::new("/tmp/prog.pgm")).unwrap();
        assert_eq!(cmd, "PROGRAM 2 LOAD \"/tmp/prog.pgm\"");
        let relative = program_load(1, Path::new("prog.pgm")).unwrap();
        assert!(relative.ends_with("prog.pgm\""));
        assert!(!relative.contains("LOAD \"prog.pgm\""));
        assert_eq!(program_start(2).unwrap(), "PROGRAM 2 START");
        assert_eq!(program_stop(31).unwrap(), "PROGRAM 31 STOP");
        assert_eq!(apply_defaults_task(None).unwrap(), "APPLYDEFAULTS TASK");
        assert_eq!(apply_defaults_task(Some(3)).unwrap(), "APPLYDEFAULTS TASK 3");
    }

    #[test]
    fn test_linear_formatting() {
        let coords = Coordinates::new().with(Axis::Y, 2.0).with(Axis::X, 1.5);
        assert_eq!(
            linear(&coords, Some(Feed::Dependent(100.0))),
            "LINEAR X1.5000000000 Y2.0000000000 F100.000000"
        );
        let coords = Coordinates::new().with(Axis::A, -0.25);
        assert_eq!(
            linear(&coords, Some(Feed::Independent(2.0))),
            "LINEAR A-0.2500000000 E2.000000"
        );
        assert_eq!(linear(&Coordinates::new().with(Axis::Z, 0.0), None), "LINEAR Z0.0000000000");
    }

    #[test]
    fn test_feed_from_parts() {
        assert!(Feed::from_parts(Some(1.0), Some(2.0)).is_err());
        assert_eq!(Feed::from_parts(None, Some(2.0)).unwrap(), Some(Feed::Independent(2.0)));
        assert_eq!(Feed::from_parts(None, None).unwrap(), None);
    }

    #[test]
    fn test_circle_requires_radius_xor_center() {
        let arc = ArcMove::with_center((Axis::X, 1.0, 0.0), (Axis::Y, 0.0, 0.0), Some(5.0));
        assert_eq!(
            circle(CircleDirection::Clockwise, &arc).unwrap(),
            "CW X1.0000000000 Y0.0000000000 I0.0000000000 J0.0000000000 F5.000000"
        );

        let arc = ArcMove::with_radius((Axis::A, 1.0), (Axis::B, 1.0), 0.5, None);
        assert_eq!(
            circle(CircleDirection::CounterClockwise, &arc).unwrap(),
            "CCW A1.0000000000 B1.0000000000 R0.5000000000"
        );

        let mut both = arc;
        both.axis1_center = Some(0.0);
        both.axis2_center = Some(0.0);
        assert!(circle(CircleDirection::Clockwise, &both).is_err());

        let mut partial = ArcMove::with_center((Axis::X, 1.0, 0.0), (Axis::Y, 0.0, 0.0), None);
        partial.axis2_center = None;
        assert!(circle(CircleDirection::Clockwise, &partial).is_err());

        let mut multi = ArcMove::with_radius((Axis::XY, 1.0), (Axis::Z, 1.0), 0.5, None);
        assert!(circle(CircleDirection::Clockwise, &multi).is_err());
        multi.axis1 = Axis::X;
        assert!(circle(CircleDirection::Clockwise, &multi).is_ok());
    }

    #[test]
    fn test_bezier() {
        let curve = BezierCurve {
            mode: BezierMode::Cubic,
            axis_h: Axis::X,
            axis_v: Axis::Y,
            points_h: [0.0, 1.0, 2.0],
            p3_h: Some(3.0),
            points_v: [0.0, 1.5, 1.5],
            p3_v: Some(0.0),
            tolerance: Some(0.01),
        };
        assert_eq!(
            bezier(&curve).unwrap(),
            "BEZIER CUBIC X, 0, 1, 2, 3, Y, 0, 1.5, 1.5, 0 TOLERANCE 0.01"
        );

        let mut mismatched = curve;
        mismatched.p3_v = None;
        assert!(bezier(&mismatched).is_err());

        let mut quadratic = curve;
        quadratic.mode = BezierMode::Quadratic;
        assert!(bezier(&quadratic).is_err());
        quadratic.p3_h = None;
        quadratic.p3_v = None;
        quadratic.tolerance = None;
        assert_eq!(
            bezier(&quadratic).unwrap(),
            "BEZIER QUADRATIC X, 0, 1, 2, Y, 0, 1.5, 1.5"
        );
    }

    #[test]
    fn test_asynchronous_moves() {
        assert_eq!(freerun(Axis::X, Some(2.5)).unwrap(), "FREERUN X 2.5");
        assert_eq!(freerun(Axis::X, None).unwrap(), "FREERUN X STOP");
        assert!(freerun(Axis::XY, None).is_err());
        assert_eq!(move_abs(Axis::Z, 1.0, 2.0).unwrap(), "MOVEABS Z 1 2");
        assert_eq!(move_inc(Axis::Y, -1.5, 2.0).unwrap(), "MOVEINC Y -1.5 2");
        assert_eq!(
            oscillate(Axis::A, 0.1, 10.0, 5, 1).unwrap(),
            "OSCILLATE A, 0.1, 10, 5, 1"
        );
    }

    #[test]
    fn test_galvo_and_ifov() {
        assert_eq!(
            galvo_laser_override(Axis::A, GalvoLaserOverrideMode::On).unwrap(),
            "GALVO LASEROVERRIDE A ON"
        );
        assert!(galvo_laser_override(Axis::X, GalvoLaserOverrideMode::On).is_err());
        assert!(galvo_laser_override(Axis::AB, GalvoLaserOverrideMode::On).is_err());
        assert_eq!(ifov_time(200).unwrap(), "IFOV TIME 200");
        assert!(ifov_time(12).is_err());
    }

    #[test]
    fn test_ascii_system_commands() {
        assert_eq!(stop_task(None).unwrap(), "~STOPTASK");
        assert_eq!(stop_task(Some(4)).unwrap(), "~STOPTASK 4");
        assert_eq!(task(1).unwrap(), "~TASK 1");
        let queries = vec![
            StatusQuery::axis(Axis::X, AxisStatusDataItem::PositionFeedback).unwrap(),
            StatusQuery::task(2, TaskStatusDataItem::TaskState).unwrap(),
            StatusQuery::system(SystemStatusDataItem::Timer),
        ];
        assert_eq!(
            status(&queries).unwrap(),
            "~STATUS (X, PositionFeedback) (2, TaskState) (Timer)"
        );
        assert!(status(&[]).is_err());
        assert!(StatusQuery::axis(Axis::XY, AxisStatusDataItem::AxisStatus).is_err());
    }
}
