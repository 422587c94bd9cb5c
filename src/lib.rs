//! NanoFactory control library
//!
//! Generates AeroBasic programs for the Aerotech A3200 motion controller of a
//! laser nanofabrication 3D printer, talks to the controller over its ASCII
//! TCP interface, and handles the device calibrations and data containers
//! that go with a print.

pub mod adapters;
pub mod aerobasic;
pub mod app;
pub mod cli;
pub mod config_initialization;
pub mod container;
pub mod devices;
pub mod domain;
pub mod drawings;
pub mod error;
pub mod ports;
pub mod settings;
pub mod tools;
pub mod utils;

// Re-export commonly used types
pub use domain::errors::DomainError;
pub use error::{NanoFactoryError, NanoResult};
