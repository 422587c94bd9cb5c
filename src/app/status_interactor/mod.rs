// Status interactor - Reports controller, axis and task state

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::devices::{Aerotech3200, ControllerSettings};
use crate::domain::constants::TaskState;
use crate::domain::geometry::Point3D;
use crate::error::NanoResult;
use crate::ports::ControllerPort;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisReport {
    pub axis: String,
    pub flags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskReport {
    pub id: u8,
    pub state: TaskState,
    pub mode: Vec<String>,
}

/// Snapshot of the controller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub version: String,
    pub system_time: String,
    pub position: Point3D,
    pub axes: Vec<AxisReport>,
    pub tasks: Vec<TaskReport>,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Controller version: {}", self.version)?;
        writeln!(f, "Controller time:    {}", self.system_time)?;
        writeln!(
            f,
            "Position: X {:.6} Y {:.6} Z {:.6}",
            self.position.x, self.position.y, self.position.z
        )?;
        writeln!(f, "Axes:")?;
        for axis in &self.axes {
            writeln!(f, "  {}: {}", axis.axis, flag_list(&axis.flags))?;
        }
        write!(f, "Tasks:")?;
        for task in &self.tasks {
            write!(f, "\n  {:2}: {:?} [{}]", task.id, task.state, flag_list(&task.mode))?;
        }
        Ok(())
    }
}

fn flag_list(flags: &[String]) -> String {
    if flags.is_empty() {
        "-".to_string()
    } else {
        flags.join(" | ")
    }
}

/// Interactor for controller status queries
pub struct StatusInteractor {
    controller_port: Arc<dyn ControllerPort>,
    settings: ControllerSettings,
}

impl StatusInteractor {
    pub fn new(controller_port: Arc<dyn ControllerPort>, settings: ControllerSettings) -> Self {
        Self {
            controller_port,
            settings,
        }
    }

    /// Query version, position, axes and optionally all tasks
    pub async fn execute(&self, with_tasks: bool) -> NanoResult<StatusReport> {
        let mut controller = Aerotech3200::new(self.controller_port.clone(), self.settings.clone());
        controller.connect().await?;
        let result = Self::query(&mut controller, with_tasks).await;
        if let Err(e) = controller.close().await {
            warn!("Failed to close controller connection: {}", e);
        }
        result
    }

    async fn query(controller: &mut Aerotech3200, with_tasks: bool) -> NanoResult<StatusReport> {
        let version = controller.version().await?.to_string();
        let system_time = controller.system_time().await?.to_rfc3339();
        let position = controller.xyz().await?;

        let axes = controller
            .axis_status()
            .await?
            .into_iter()
            .map(|(axis, status)| AxisReport {
                axis: axis.to_string(),
                flags: status.iter_names().map(|(name, _)| name.to_string()).collect(),
            })
            .collect();

        let tasks = if with_tasks {
            controller
                .sync_tasks()
                .await?
                .into_iter()
                .map(|(id, snapshot)| TaskReport {
                    id,
                    state: snapshot.state,
                    mode: snapshot
                        .mode
                        .iter_names()
                        .map(|(name, _)| name.to_string())
                        .collect(),
                })
                .collect()
        } else {
            Vec::new()
        };

        info!(%version, "Controller status queried");
        Ok(StatusReport {
            version,
            system_time,
            position,
            axes,
            tasks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::dummy_controller::DUMMY_VERSION;
    use crate::adapters::DummyControllerAdapter;
    use crate::domain::constants::MAX_NUMBER_OF_TASKS;

    #[tokio::test]
    async fn test_status_from_dummy() {
        let port = Arc::new(DummyControllerAdapter::new());
        port.respond_to("~STATUS (X, PositionFeedback)", &["1,5 2.25 -0.5"])
            .await;
        port.respond_to("~STATUS (X, AxisStatus)", &["1 0 3 0 0"]).await;
        let interactor = StatusInteractor::new(port, ControllerSettings::default());

        let report = interactor.execute(true).await.unwrap();
        assert_eq!(report.version, DUMMY_VERSION);
        assert_eq!(report.position, Point3D::new(1.5, 2.25, -0.5));
        assert_eq!(report.axes.len(), 5);
        assert_eq!(report.axes[0].flags, vec!["Homed"]);
        assert_eq!(report.axes[2].flags, vec!["Homed", "Profiling"]);
        assert!(report.axes[1].flags.is_empty());
        assert_eq!(report.tasks.len(), MAX_NUMBER_OF_TASKS as usize);
        assert!(report.tasks.iter().all(|t| t.state == TaskState::Idle));

        let text = report.to_string();
        assert!(text.contains("Position: X 1.500000 Y 2.250000 Z -0.500000"));
        assert!(text.contains("  X: Homed"));
    }

    #[tokio::test]
    async fn test_status_without_tasks() {
        let port = Arc::new(DummyControllerAdapter::new());
        let interactor = StatusInteractor::new(port.clone(), ControllerSettings::default());
        let report = interactor.execute(false).await.unwrap();
        assert!(report.tasks.is_empty());
        assert!(!port.commands().await.iter().any(|c| c.contains("TaskState")));
    }
}
