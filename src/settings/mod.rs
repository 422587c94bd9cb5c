//! Laboratory configuration
//!
//! [`SystemConfig`] is the site-wide JSON file describing users, objectives
//! and device sections. [`ParameterSet`] holds the tunable parameters of one
//! algorithm or device, seeded from defaults and overridden per section.

pub mod parameters;
pub mod system;

pub use parameters::{pop_sections, ParameterSet};
pub use system::SystemConfig;
