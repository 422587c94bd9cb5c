//! Laboratory devices
//!
//! Services on top of the ports: the A3200 motion controller, the microscope
//! camera and the laser power attenuator.

pub mod attenuator;
pub mod camera;
pub mod controller;

pub use attenuator::{Attenuator, FitKind};
pub use camera::Camera;
pub use controller::{Aerotech3200, ControllerSettings, Task, TaskSnapshot};
