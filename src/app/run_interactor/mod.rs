// Run interactor - Sends programs to the motion controller

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::aerobasic::AeroBasicProgram;
use crate::devices::{Aerotech3200, ControllerSettings};
use crate::domain::constants::TaskState;
use crate::error::NanoResult;
use crate::ports::ControllerPort;
use crate::utils::path::PathUtils;

/// How a program reaches the controller
#[derive(Debug, Clone, PartialEq)]
pub enum RunMode {
    /// Line by line over the command interface
    Synchronous,
    /// Loaded into a task and started there
    Task {
        task_id: Option<u8>,
        wait: bool,
        timeout: Option<Duration>,
    },
}

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub program: PathBuf,
    pub mode: RunMode,
    /// Home all axes before running
    pub home: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunResponse {
    pub lines_sent: Option<usize>,
    pub task_id: Option<u8>,
    pub final_state: Option<TaskState>,
    pub elapsed: Duration,
}

/// Interactor for program execution
pub struct RunInteractor {
    controller_port: Arc<dyn ControllerPort>,
    settings: ControllerSettings,
}

impl RunInteractor {
    pub fn new(controller_port: Arc<dyn ControllerPort>, settings: ControllerSettings) -> Self {
        Self {
            controller_port,
            settings,
        }
    }

    /// Run a program file; the connection is closed afterwards even on failure
    pub async fn execute(&self, request: RunRequest) -> NanoResult<RunResponse> {
        PathUtils::require_file(&request.program)?;
        let mut controller = Aerotech3200::new(self.controller_port.clone(), self.settings.clone());
        controller.connect().await?;

        let result = self.run(&mut controller, &request).await;
        if let Err(e) = controller.close().await {
            warn!("Failed to close controller connection: {}", e);
        }
        result
    }

    async fn run(&self, controller: &mut Aerotech3200, request: &RunRequest) -> NanoResult<RunResponse> {
        let started = Instant::now();
        controller.initialize().await?;
        if request.home {
            controller.home().await?;
        }

        let response = match &request.mode {
            RunMode::Synchronous => {
                let text = std::fs::read_to_string(&request.program)?;
                let program = AeroBasicProgram::from_text(&text);
                let sent = controller.run_program_synchronous(&program).await?;
                RunResponse {
                    lines_sent: Some(sent),
                    task_id: None,
                    final_state: None,
                    elapsed: started.elapsed(),
                }
            }
            RunMode::Task {
                task_id,
                wait,
                timeout,
            } => {
                // the controller resolves paths on its own file system
                let path = PathUtils::resolve(&std::env::current_dir()?, &request.program);
                let mut task = controller.run_file_as_task(&path, *task_id).await?;
                let state = if *wait {
                    task.wait_to_finish(self.settings.poll_interval, *timeout).await?
                } else {
                    task.task_state().await?
                };
                RunResponse {
                    lines_sent: None,
                    task_id: Some(task.id()),
                    final_state: Some(state),
                    elapsed: started.elapsed(),
                }
            }
        };
        info!(
            program = %request.program.display(),
            elapsed_ms = response.elapsed.as_millis() as u64,
            "Program run finished"
        );
        Ok(response)
    }
}
