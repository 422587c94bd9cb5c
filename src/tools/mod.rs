//! Measurement evaluation tools
//!
//! Plane fitting of resin interfaces and the stage/camera coordinate
//! transformation, plus the small dense linear algebra both need.

pub mod linalg;
pub mod plane;
pub mod transform;

pub use plane::{PlaneFit, PlaneScan};
pub use transform::{CalibrationLevel, Transform};
