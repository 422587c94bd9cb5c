// Domain layer - Core business logic

pub mod axis;
pub mod constants;
pub mod coordinate_system;
pub mod errors;
pub mod geometry;
