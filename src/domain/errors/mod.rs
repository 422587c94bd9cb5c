// Domain errors - Error types for the domain layer

use std::fmt;

/// Domain-specific error types
#[derive(Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Invalid arguments provided
    BadArgs(String),
    /// Axis name or axis combination not usable
    Axis(String),
    /// Command cannot be expressed in AeroBasic
    InvalidCommand(String),
    /// Degenerate geometry (empty shape, mismatched directions, ...)
    Geometry(String),
    /// Calibration data missing or inconsistent
    Calibration(String),
    /// Controller rejected the command text
    InvalidSyntax { command: String },
    /// Controller reported a fault while executing a command
    ControllerFault { command: String, reason: String },
    /// Controller answered with something we do not understand
    Protocol(String),
    /// No controller connection
    NotConnected,
    /// Operation did not finish in time
    Timeout(String),
    /// Data container malformed or of the wrong kind
    Container(String),
    /// Configuration missing or invalid
    Config(String),
    /// Named entry not found
    NotFound(String),
    /// File system failure
    FsFail(String),
    /// Device (camera, detector, ...) failure
    Device(String),
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainError::BadArgs(msg) => write!(f, "Bad arguments: {}", msg),
            DomainError::Axis(msg) => write!(f, "Axis error: {}", msg),
            DomainError::InvalidCommand(msg) => write!(f, "Invalid command: {}", msg),
            DomainError::Geometry(msg) => write!(f, "Geometry error: {}", msg),
            DomainError::Calibration(msg) => write!(f, "Calibration error: {}", msg),
            DomainError::InvalidSyntax { command } => {
                write!(f, "Controller rejected syntax of '{}'", command)
            }
            DomainError::ControllerFault { command, reason } => {
                write!(f, "Controller fault on '{}': {}", command, reason)
            }
            DomainError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            DomainError::NotConnected => write!(f, "Controller is not connected"),
            DomainError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            DomainError::Container(msg) => write!(f, "Container error: {}", msg),
            DomainError::Config(msg) => write!(f, "Configuration error: {}", msg),
            DomainError::NotFound(msg) => write!(f, "Not found: {}", msg),
            DomainError::FsFail(msg) => write!(f, "File system error: {}", msg),
            DomainError::Device(msg) => write!(f, "Device error: {}", msg),
        }
    }
}

impl std::error::Error for DomainError {}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::FsFail(err.to_string())
    }
}
