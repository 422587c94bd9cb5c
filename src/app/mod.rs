// Application layer - Use case interactors

pub mod calibration_interactor;
pub mod container;
pub mod draw_interactor;
pub mod run_interactor;
pub mod status_interactor;

// Re-export interactors
pub use calibration_interactor::CalibrationInteractor;
pub use draw_interactor::DrawInteractor;
pub use run_interactor::RunInteractor;
pub use status_interactor::StatusInteractor;
