// Adapters - External system implementations

pub mod ascii_tcp;
pub mod dummy_controller;
pub mod simulated_camera;
pub mod simulated_layer;
pub mod toml_config;

// Re-export adapters
pub use ascii_tcp::AsciiTcpAdapter;
pub use dummy_controller::DummyControllerAdapter;
pub use simulated_camera::SimulatedCameraAdapter;
pub use simulated_layer::SimulatedLayerAdapter;
pub use toml_config::TomlConfigAdapter;
