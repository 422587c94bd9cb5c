//! Aerotech A3200 controller service
//!
//! [`Aerotech3200`] keeps track of the modes it has set and runs programs either
//! line by line or as a controller task. [`Task`] caches the status words of one
//! task until it is synced again.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aerobasic::commands::{self, StatusQuery};
use crate::aerobasic::AeroBasicProgram;
use crate::domain::axis::Axis;
use crate::domain::constants::{
    parse_status_word, AxisStatus, AxisStatusDataItem, ProgrammingMode, SystemStatusDataItem,
    TaskMode, TaskState, TaskStatus, TaskStatus0, TaskStatus1, TaskStatus2, TaskStatusDataItem,
    VelocityMode, Version, WaitMode, MAX_NUMBER_OF_TASKS,
};
use crate::domain::errors::DomainError;
use crate::domain::geometry::{Coordinates, Point3D};
use crate::ports::ControllerPort;
use crate::utils::logging::ProgressReporter;

/// Task used for programs when none is given
pub const DEFAULT_TASK: u8 = 2;

/// Where generated programs go and how task execution is polled
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSettings {
    pub program_dir: PathBuf,
    pub default_task: u8,
    pub ready_timeout: Duration,
    pub start_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            program_dir: PathBuf::from("programs"),
            default_task: DEFAULT_TASK,
            ready_timeout: Duration::from_secs(10),
            start_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(100),
        }
    }
}

fn parse_float(text: &str) -> Result<f64, DomainError> {
    text.trim()
        .replace(',', ".")
        .parse()
        .map_err(|_| DomainError::Protocol(format!("Cannot parse number '{}'", text)))
}

/// Split a `~STATUS` response into exactly `count` values
fn split_status(response: &str, count: usize) -> Result<Vec<&str>, DomainError> {
    let values: Vec<&str> = response.split_whitespace().collect();
    if values.len() != count {
        return Err(DomainError::Protocol(format!(
            "Expected {} status values, got '{}'",
            count, response
        )));
    }
    Ok(values)
}

/// Generated program file name: timestamp plus a short random tag
fn program_file_name() -> String {
    let tag = Uuid::new_v4().simple().to_string();
    format!(
        "{}_automatic_program_{}.pgm",
        Local::now().format("%Y%m%d_%H%M%S"),
        &tag[..5]
    )
}

/// Status words of a task at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub mode: TaskMode,
    pub state: TaskState,
    pub status: TaskStatus,
}

/// One controller task
pub struct Task {
    port: Arc<dyn ControllerPort>,
    id: u8,
    file_path: Option<PathBuf>,
    snapshot: Option<TaskSnapshot>,
}

impl Task {
    pub fn new(port: Arc<dyn ControllerPort>, id: u8) -> Result<Self, DomainError> {
        commands::validate_task_id(id)?;
        Ok(Self {
            port,
            id,
            file_path: None,
            snapshot: None,
        })
    }

    pub fn with_file(mut self, path: PathBuf) -> Self {
        self.file_path = Some(path);
        self
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    /// Program file loaded into the task, if known
    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// Query mode, state and status words in one round trip
    pub async fn sync(&mut self) -> Result<TaskSnapshot, DomainError> {
        let queries = [
            TaskStatusDataItem::TaskMode,
            TaskStatusDataItem::TaskState,
            TaskStatusDataItem::TaskStatus0,
            TaskStatusDataItem::TaskStatus1,
            TaskStatusDataItem::TaskStatus2,
        ]
        .into_iter()
        .map(|item| StatusQuery::task(self.id, item))
        .collect::<Result<Vec<_>, _>>()?;

        let response = self.port.send(&commands::status(&queries)?).await?;
        let values = split_status(&response, 5)?;
        let snapshot = TaskSnapshot {
            mode: TaskMode::from_bits_retain(parse_status_word(values[0])?),
            state: TaskState::from_code(i64::from(parse_status_word(values[1])?))?,
            status: TaskStatus {
                status0: TaskStatus0::from_bits_retain(parse_status_word(values[2])?),
                status1: TaskStatus1::from_bits_retain(parse_status_word(values[3])?),
                status2: TaskStatus2::from_bits_retain(parse_status_word(values[4])?),
            },
        };
        debug!(task = self.id, state = ?snapshot.state, "Task synced");
        self.snapshot = Some(snapshot);
        Ok(snapshot)
    }

    /// Forget the cached status
    pub fn reset(&mut self) {
        self.snapshot = None;
    }

    async fn cached(&mut self) -> Result<TaskSnapshot, DomainError> {
        match self.snapshot {
            Some(snapshot) => Ok(snapshot),
            None => self.sync().await,
        }
    }

    pub async fn task_mode(&mut self) -> Result<TaskMode, DomainError> {
        Ok(self.cached().await?.mode)
    }

    pub async fn task_state(&mut self) -> Result<TaskState, DomainError> {
        Ok(self.cached().await?.state)
    }

    pub async fn task_status(&mut self) -> Result<TaskStatus, DomainError> {
        Ok(self.cached().await?.status)
    }

    pub async fn wait_mode(&mut self) -> Result<WaitMode, DomainError> {
        Ok(WaitMode::from_task_mode(self.task_mode().await?))
    }

    /// Poll until the program is no longer running
    pub async fn wait_to_finish(
        &mut self,
        poll_interval: Duration,
        timeout: Option<Duration>,
    ) -> Result<TaskState, DomainError> {
        let mut progress = ProgressReporter::new();
        progress.start_operation(&format!("task {}", self.id));
        let started = tokio::time::Instant::now();

        loop {
            let state = self.sync().await?.state;
            match state {
                TaskState::ProgramRunning
                | TaskState::ProgramFeedHeld
                | TaskState::ProgramPaused
                | TaskState::Queue => progress.update(&format!("{:?}", state)),
                TaskState::Error => {
                    progress.complete_operation(false);
                    return Err(DomainError::ControllerFault {
                        command: format!("task {}", self.id),
                        reason: "Task stopped with an error".to_string(),
                    });
                }
                _ => {
                    progress.complete_operation(true);
                    return Ok(state);
                }
            }
            if let Some(timeout) = timeout {
                if started.elapsed() >= timeout {
                    progress.complete_operation(false);
                    return Err(DomainError::Timeout(format!(
                        "Task {} still running after {:.1} s",
                        self.id,
                        timeout.as_secs_f64()
                    )));
                }
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Stop the program running in this task
    pub async fn stop(&mut self) -> Result<(), DomainError> {
        self.port.send(&commands::program_stop(self.id)?).await?;
        self.reset();
        info!(task = self.id, "Task stopped");
        Ok(())
    }

    /// Poll until `done` accepts the task state
    async fn poll_until(
        &mut self,
        done: impl Fn(TaskState) -> bool,
        timeout: Duration,
        poll_interval: Duration,
        what: &str,
    ) -> Result<TaskState, DomainError> {
        let started = tokio::time::Instant::now();
        loop {
            let state = self.sync().await?.state;
            if done(state) {
                return Ok(state);
            }
            if started.elapsed() >= timeout {
                return Err(DomainError::Timeout(format!(
                    "{} after {:.1} s (task {} is {:?})",
                    what,
                    timeout.as_secs_f64(),
                    self.id,
                    state
                )));
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

/// A3200 motion controller
pub struct Aerotech3200 {
    port: Arc<dyn ControllerPort>,
    settings: ControllerSettings,
    programming_mode: Option<ProgrammingMode>,
    velocity_mode: Option<VelocityMode>,
    wait_mode: Option<WaitMode>,
    enabled_axes: Axis,
    version: Option<Version>,
}

impl Aerotech3200 {
    pub fn new(port: Arc<dyn ControllerPort>, settings: ControllerSettings) -> Self {
        Self {
            port,
            settings,
            programming_mode: None,
            velocity_mode: None,
            wait_mode: None,
            enabled_axes: Axis::empty(),
            version: None,
        }
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub async fn connect(&self) -> Result<(), DomainError> {
        self.port.connect().await
    }

    pub async fn close(&self) -> Result<(), DomainError> {
        self.port.close().await
    }

    /// Absolute coordinates, velocity profiling and automatic wait mode
    pub async fn initialize(&mut self) -> Result<(), DomainError> {
        self.set_programming_mode(ProgrammingMode::Absolute).await?;
        self.set_velocity_mode(VelocityMode::On).await?;
        self.set_wait_mode(WaitMode::Auto).await?;
        info!("Controller initialized");
        Ok(())
    }

    /// Controller version, queried once
    pub async fn version(&mut self) -> Result<Version, DomainError> {
        if let Some(version) = &self.version {
            return Ok(version.clone());
        }
        let version: Version = self.port.send(&commands::version()).await?.parse()?;
        self.version = Some(version.clone());
        Ok(version)
    }

    /// Controller clock
    pub async fn system_time(&self) -> Result<DateTime<Local>, DomainError> {
        let response = self
            .port
            .send(&commands::system_status(SystemStatusDataItem::Timer, None))
            .await?;
        let millis = parse_float(&response)?;
        Local
            .timestamp_millis_opt(millis as i64)
            .single()
            .ok_or_else(|| DomainError::Protocol(format!("Invalid controller time '{}'", response)))
    }

    /// Position feedback of the X, Y and Z axes
    pub async fn xyz(&self) -> Result<Point3D, DomainError> {
        let queries = [Axis::X, Axis::Y, Axis::Z]
            .into_iter()
            .map(|axis| StatusQuery::axis(axis, AxisStatusDataItem::PositionFeedback))
            .collect::<Result<Vec<_>, _>>()?;
        let response = self.port.send(&commands::status(&queries)?).await?;
        let values = split_status(&response, 3)?;
        Ok(Point3D::new(
            parse_float(values[0])?,
            parse_float(values[1])?,
            parse_float(values[2])?,
        ))
    }

    /// Status word of every axis
    pub async fn axis_status(&self) -> Result<Vec<(Axis, AxisStatus)>, DomainError> {
        let axes = [Axis::X, Axis::Y, Axis::Z, Axis::A, Axis::B];
        let queries = axes
            .iter()
            .map(|&axis| StatusQuery::axis(axis, AxisStatusDataItem::AxisStatus))
            .collect::<Result<Vec<_>, _>>()?;
        let response = self.port.send(&commands::status(&queries)?).await?;
        split_status(&response, axes.len())?
            .into_iter()
            .zip(axes)
            .map(|(value, axis)| Ok((axis, AxisStatus::from_bits_retain(parse_status_word(value)?))))
            .collect()
    }

    pub fn programming_mode(&self) -> Option<ProgrammingMode> {
        self.programming_mode
    }

    pub fn velocity_mode(&self) -> Option<VelocityMode> {
        self.velocity_mode
    }

    /// Wait mode last set through this service
    pub fn wait_mode(&self) -> Option<WaitMode> {
        self.wait_mode
    }

    pub fn enabled_axes(&self) -> Axis {
        self.enabled_axes
    }

    pub async fn set_programming_mode(&mut self, mode: ProgrammingMode) -> Result<(), DomainError> {
        self.port.send(&commands::programming_mode(mode)).await?;
        self.programming_mode = Some(mode);
        Ok(())
    }

    pub async fn set_velocity_mode(&mut self, mode: VelocityMode) -> Result<(), DomainError> {
        self.port.send(&commands::velocity(mode)).await?;
        self.velocity_mode = Some(mode);
        Ok(())
    }

    pub async fn set_wait_mode(&mut self, mode: WaitMode) -> Result<(), DomainError> {
        self.port.send(&commands::wait_mode(mode)).await?;
        self.wait_mode = Some(mode);
        Ok(())
    }

    async fn task_item(&self, task_id: u8, item: TaskStatusDataItem) -> Result<u32, DomainError> {
        let response = self
            .port
            .send(&commands::task_status(Some(task_id), item, None)?)
            .await?;
        parse_status_word(&response)
    }

    pub async fn task_state(&self, task_id: u8) -> Result<TaskState, DomainError> {
        TaskState::from_code(i64::from(
            self.task_item(task_id, TaskStatusDataItem::TaskState).await?,
        ))
    }

    pub async fn task_mode(&self, task_id: u8) -> Result<TaskMode, DomainError> {
        Ok(TaskMode::from_bits_retain(
            self.task_item(task_id, TaskStatusDataItem::TaskMode).await?,
        ))
    }

    /// Wait mode the task currently runs with
    pub async fn task_wait_mode(&self, task_id: u8) -> Result<WaitMode, DomainError> {
        Ok(WaitMode::from_task_mode(self.task_mode(task_id).await?))
    }

    pub async fn task_status(&self, task_id: u8) -> Result<TaskStatus, DomainError> {
        let queries = [
            TaskStatusDataItem::TaskStatus0,
            TaskStatusDataItem::TaskStatus1,
            TaskStatusDataItem::TaskStatus2,
        ]
        .into_iter()
        .map(|item| StatusQuery::task(task_id, item))
        .collect::<Result<Vec<_>, _>>()?;
        let response = self.port.send(&commands::status(&queries)?).await?;
        let values = split_status(&response, 3)?;
        TaskStatus::from_strings(values[0], values[1], values[2])
    }

    /// Snapshots of all controller tasks
    pub async fn sync_tasks(&self) -> Result<Vec<(u8, TaskSnapshot)>, DomainError> {
        let mut snapshots = Vec::with_capacity(MAX_NUMBER_OF_TASKS as usize);
        for id in 0..MAX_NUMBER_OF_TASKS {
            let mut task = Task::new(self.port.clone(), id)?;
            snapshots.push((id, task.sync().await?));
        }
        Ok(snapshots)
    }

    /// Send the program line by line; blank lines and comments stay local
    pub async fn run_program_synchronous(&self, program: &AeroBasicProgram) -> Result<usize, DomainError> {
        let mut sent = 0;
        for line in program {
            let command = line.trim();
            if command.is_empty() || command.starts_with('\'') {
                continue;
            }
            self.port.send(command).await?;
            sent += 1;
        }
        info!(lines = sent, "Program sent synchronously");
        Ok(sent)
    }

    /// Write the program to the program directory and run it as a task
    pub async fn run_program_as_task(
        &self,
        program: &AeroBasicProgram,
        task_id: Option<u8>,
    ) -> Result<Task, DomainError> {
        let path = self.settings.program_dir.join(program_file_name());
        program.write(&path, false)?;
        info!(path = %path.display(), "Program written");
        self.run_file_as_task(&path, task_id).await
    }

    /// Load a program file into a task, start it and wait until it runs
    pub async fn run_file_as_task(&self, path: &Path, task_id: Option<u8>) -> Result<Task, DomainError> {
        let task_id = task_id.unwrap_or(self.settings.default_task);
        self.port.send(&commands::program_load(task_id, path)?).await?;

        let mut task = Task::new(self.port.clone(), task_id)?.with_file(path.to_path_buf());
        task.poll_until(
            |state| state == TaskState::ProgramReady,
            self.settings.ready_timeout,
            self.settings.poll_interval,
            &format!("Could not load program {}", path.display()),
        )
        .await?;

        self.port.send(&commands::program_start(task_id)?).await?;
        let state = task
            .poll_until(
                |state| matches!(state, TaskState::ProgramRunning | TaskState::ProgramComplete),
                self.settings.start_timeout,
                self.settings.poll_interval,
                "Program did not start",
            )
            .await?;
        info!(task = task_id, ?state, "Program started");
        Ok(task)
    }

    pub async fn enable_axes(&mut self, axes: Axis) -> Result<(), DomainError> {
        self.port.send(&commands::enable(axes)).await?;
        self.enabled_axes |= axes;
        Ok(())
    }

    /// Home all axes; Y moves out of the way before X is homed
    pub async fn home(&self) -> Result<(), DomainError> {
        warn!("Homing all axes");
        self.port
            .send(&commands::home(Axis::YZ | Axis::AB, false))
            .await?;
        self.port
            .send(&commands::linear(&Coordinates::new().with(Axis::Y, 80.0), None))
            .await?;
        self.port.send(&commands::home(Axis::X, false)).await?;
        self.port
            .send(&commands::linear(&Coordinates::new().with(Axis::Y, 0.0), None))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::dummy_controller::DUMMY_VERSION;
    use crate::adapters::DummyControllerAdapter;

    fn settings(dir: &Path) -> ControllerSettings {
        ControllerSettings {
            program_dir: dir.to_path_buf(),
            ready_timeout: Duration::from_millis(200),
            start_timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(1),
            ..ControllerSettings::default()
        }
    }

    fn controller() -> (Arc<DummyControllerAdapter>, Aerotech3200) {
        let dummy = Arc::new(DummyControllerAdapter::new());
        let controller = Aerotech3200::new(dummy.clone(), ControllerSettings::default());
        (dummy, controller)
    }

    #[tokio::test]
    async fn test_initialize_tracks_modes() {
        let (dummy, mut controller) = controller();
        controller.initialize().await.unwrap();
        assert_eq!(dummy.commands().await, vec!["ABSOLUTE", "VELOCITY ON", "WAIT MODE AUTO"]);
        assert_eq!(controller.programming_mode(), Some(ProgrammingMode::Absolute));
        assert_eq!(controller.wait_mode(), Some(WaitMode::Auto));
    }

    #[tokio::test]
    async fn test_version_is_cached() {
        let (dummy, mut controller) = controller();
        assert_eq!(controller.version().await.unwrap().to_string(), DUMMY_VERSION);
        controller.version().await.unwrap();
        assert_eq!(dummy.commands().await.len(), 1);
    }

    #[tokio::test]
    async fn test_position_accepts_decimal_commas() {
        let (dummy, controller) = controller();
        dummy
            .respond_to("~STATUS (X, PositionFeedback)", &["1,5 -2.25 3"])
            .await;
        assert_eq!(controller.xyz().await.unwrap(), Point3D::new(1.5, -2.25, 3.0));
        assert_eq!(
            dummy.commands().await[0],
            "~STATUS (X, PositionFeedback) (Y, PositionFeedback) (Z, PositionFeedback)"
        );

        dummy.respond_to("~STATUS (X, AxisStatus)", &["1 0 1 0"]).await;
        assert!(controller.axis_status().await.is_err());
    }

    #[tokio::test]
    async fn test_axis_status() {
        let (dummy, controller) = controller();
        dummy.respond_to("~STATUS (X, AxisStatus)", &["1 1 0 0 3"]).await;
        let status = controller.axis_status().await.unwrap();
        assert_eq!(status.len(), 5);
        assert!(status[0].1.contains(AxisStatus::Homed));
        assert_eq!(status[4], (Axis::B, AxisStatus::Homed | AxisStatus::Profiling));
    }

    #[tokio::test]
    async fn test_task_queries() {
        let (dummy, controller) = controller();
        dummy.respond_to("TASKSTATUS(2, DATAITEM_TaskMode)", &["1073741826"]).await;
        assert_eq!(controller.task_wait_mode(2).await.unwrap(), WaitMode::Auto);
        assert_eq!(controller.task_state(2).await.unwrap(), TaskState::Idle);
        assert!(controller.task_state(40).await.is_err());
    }

    #[tokio::test]
    async fn test_home_sequence() {
        let (dummy, controller) = controller();
        controller.home().await.unwrap();
        let commands = dummy.commands().await;
        assert_eq!(commands[0], "HOME Y Z A B");
        assert!(commands[1].starts_with("LINEAR Y80.0"));
        assert_eq!(commands[2], "HOME X");
        assert!(commands[3].starts_with("LINEAR Y0.0"));
    }

    #[tokio::test]
    async fn test_synchronous_run_skips_comments() {
        let (dummy, mut controller) = controller();
        controller.enable_axes(Axis::XY).await.unwrap();
        controller.enable_axes(Axis::Z).await.unwrap();
        assert_eq!(controller.enabled_axes(), Axis::XYZ);

        let program = AeroBasicProgram::from_text("' setup\nENABLE X\n\nLINEAR X1.0\n");
        assert_eq!(controller.run_program_synchronous(&program).await.unwrap(), 2);
        assert_eq!(dummy.commands().await[2..], ["ENABLE X", "LINEAR X1.0"]);
    }

    #[tokio::test]
    async fn test_run_program_as_task() {
        let dir = tempfile::tempdir().unwrap();
        let dummy = Arc::new(DummyControllerAdapter::new());
        let controller = Aerotech3200::new(dummy.clone(), settings(dir.path()));

        let program = AeroBasicProgram::from_text("ENABLE X\n");
        let mut task = controller.run_program_as_task(&program, None).await.unwrap();
        assert_eq!(task.id(), DEFAULT_TASK);
        let path = task.file_path().unwrap().to_path_buf();
        assert!(path.exists());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .contains("_automatic_program_"));

        assert_eq!(task.task_state().await.unwrap(), TaskState::ProgramComplete);
        let state = task
            .wait_to_finish(Duration::from_millis(1), Some(Duration::from_secs(1)))
            .await
            .unwrap();
        assert_eq!(state, TaskState::ProgramComplete);

        task.stop().await.unwrap();
        assert_eq!(task.task_state().await.unwrap(), TaskState::Idle);
    }

    #[tokio::test]
    async fn test_program_ready_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let dummy = Arc::new(DummyControllerAdapter::new());
        dummy.respond_to("~STATUS (2, TaskMode)", &["0 2 0 0 0"]).await;
        let controller = Aerotech3200::new(dummy.clone(), settings(dir.path()));

        let err = controller
            .run_file_as_task(&dir.path().join("x.pgm"), None)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DomainError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_task_error_state() {
        let dummy = Arc::new(DummyControllerAdapter::new());
        dummy.respond_to("~STATUS (5, TaskMode)", &["0 4 0 0 0", "0 8 0 0 0"]).await;
        let mut task = Task::new(dummy.clone(), 5).unwrap();
        let err = task
            .wait_to_finish(Duration::from_millis(1), None)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DomainError::ControllerFault { .. }));
        assert!(Task::new(dummy, 32).is_err());
    }
}
