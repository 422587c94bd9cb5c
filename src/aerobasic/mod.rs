//! AeroBasic language support
//!
//! [`AeroBasic`] turns typed calls into command lines and hands them to a sink
//! (a program being assembled or a variable assignment). Live controllers are
//! driven through [`crate::ports::ControllerPort`] with the same [`commands`].

pub mod commands;
pub mod program;
pub mod setups;
pub mod trace;

use std::path::Path;

use crate::domain::axis::Axis;
use crate::domain::constants::{
    AxisStatusDataItem, CircleDirection, GalvoLaserOverrideMode, ProgrammingMode,
    SystemStatusDataItem, TaskStatusDataItem, VelocityMode, WaitMode,
};
use crate::domain::errors::DomainError;
use crate::domain::geometry::Coordinates;

pub use commands::{ArcMove, BezierCurve, Feed, StatusQuery};
pub use program::{AeroBasicProgram, ProgramVariable, RenderOptions};

/// Sink for AeroBasic commands with one method per command
pub trait AeroBasic {
    /// Append one command line, returning the line as stored
    fn send(&mut self, command: &str) -> String;

    fn acknowledge_all(&mut self) -> String {
        self.send(&commands::acknowledge_all())
    }

    fn error_decode(&mut self, error_code: i64, error_location: i64) -> String {
        self.send(&commands::error_decode(error_code, error_location))
    }

    fn absolute(&mut self) -> String {
        self.send(&commands::programming_mode(ProgrammingMode::Absolute))
    }

    fn incremental(&mut self) -> String {
        self.send(&commands::programming_mode(ProgrammingMode::Incremental))
    }

    fn enable(&mut self, axes: Axis) -> String {
        self.send(&commands::enable(axes))
    }

    fn disable(&mut self, axes: Axis) -> String {
        self.send(&commands::disable(axes))
    }

    fn abort(&mut self, axes: Axis) -> String {
        self.send(&commands::abort(axes))
    }

    fn velocity(&mut self, mode: VelocityMode) -> String {
        self.send(&commands::velocity(mode))
    }

    fn wait_mode(&mut self, mode: WaitMode) -> String {
        self.send(&commands::wait_mode(mode))
    }

    fn dwell(&mut self, duration: f64) -> Result<String, DomainError> {
        Ok(self.send(&commands::dwell(duration)?))
    }

    fn home(&mut self, axes: Axis, conditional: bool) -> String {
        self.send(&commands::home(axes, conditional))
    }

    fn axis_status(
        &mut self,
        axis: Axis,
        item: AxisStatusDataItem,
        additional_data: Option<&str>,
    ) -> Result<String, DomainError> {
        Ok(self.send(&commands::axis_status(axis, item, additional_data)?))
    }

    fn system_status(&mut self, item: SystemStatusDataItem, additional_data: Option<&str>) -> String {
        self.send(&commands::system_status(item, additional_data))
    }

    fn task_status(
        &mut self,
        task_id: Option<u8>,
        item: TaskStatusDataItem,
        additional_data: Option<&str>,
    ) -> Result<String, DomainError> {
        Ok(self.send(&commands::task_status(task_id, item, additional_data)?))
    }

    fn program_load(&mut self, task_id: u8, program_path: &Path) -> Result<String, DomainError> {
        Ok(self.send(&commands::program_load(task_id, program_path)?))
    }

    fn program_start(&mut self, task_id: u8) -> Result<String, DomainError> {
        Ok(self.send(&commands::program_start(task_id)?))
    }

    fn program_stop(&mut self, task_id: u8) -> Result<String, DomainError> {
        Ok(self.send(&commands::program_stop(task_id)?))
    }

    fn apply_defaults_axis(&mut self, axes: Axis) -> String {
        self.send(&commands::apply_defaults_axis(axes))
    }

    fn apply_defaults_task(&mut self, task_id: Option<u8>) -> Result<String, DomainError> {
        Ok(self.send(&commands::apply_defaults_task(task_id)?))
    }

    fn linear(&mut self, coordinates: &Coordinates, feed: Option<Feed>) -> String {
        self.send(&commands::linear(coordinates, feed))
    }

    fn cw(&mut self, arc: &ArcMove) -> Result<String, DomainError> {
        Ok(self.send(&commands::circle(CircleDirection::Clockwise, arc)?))
    }

    fn ccw(&mut self, arc: &ArcMove) -> Result<String, DomainError> {
        Ok(self.send(&commands::circle(CircleDirection::CounterClockwise, arc)?))
    }

    fn bezier(&mut self, curve: &BezierCurve) -> Result<String, DomainError> {
        Ok(self.send(&commands::bezier(curve)?))
    }

    fn freerun(&mut self, axis: Axis, velocity: Option<f64>) -> Result<String, DomainError> {
        Ok(self.send(&commands::freerun(axis, velocity)?))
    }

    fn move_abs(&mut self, axis: Axis, position: f64, speed: f64) -> Result<String, DomainError> {
        Ok(self.send(&commands::move_abs(axis, position, speed)?))
    }

    fn move_inc(&mut self, axis: Axis, distance: f64, speed: f64) -> Result<String, DomainError> {
        Ok(self.send(&commands::move_inc(axis, distance, speed)?))
    }

    fn oscillate(
        &mut self,
        axis: Axis,
        distance: f64,
        frequency: f64,
        cycles: u32,
        num_iterations: u32,
    ) -> Result<String, DomainError> {
        Ok(self.send(&commands::oscillate(
            axis,
            distance,
            frequency,
            cycles,
            num_iterations,
        )?))
    }

    fn galvo_laser_override(
        &mut self,
        axis: Axis,
        mode: GalvoLaserOverrideMode,
    ) -> Result<String, DomainError> {
        Ok(self.send(&commands::galvo_laser_override(axis, mode)?))
    }

    fn ifov_time(&mut self, search_time_ms: u32) -> Result<String, DomainError> {
        Ok(self.send(&commands::ifov_time(search_time_ms)?))
    }
}
