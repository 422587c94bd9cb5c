// Ports - Interface definitions (contracts)

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::domain::constants::ReturnCode;
use crate::domain::errors::DomainError;
use crate::domain::geometry::Point3D;

/// Port for the command interface of a motion controller
#[async_trait]
pub trait ControllerPort: Send + Sync {
    /// Open the connection; connecting twice is a no-op
    async fn connect(&self) -> Result<(), DomainError>;

    /// Close the connection; closing a closed connection is a no-op
    async fn close(&self) -> Result<(), DomainError>;

    async fn is_connected(&self) -> bool;

    /// Execute one command and return the response data
    async fn send(&self, command: &str) -> Result<String, DomainError>;

    /// All commands sent so far, oldest first
    async fn history(&self) -> Vec<CommandRecord>;
}

/// One command sent to the controller and what came back
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandRecord {
    pub command: String,
    pub return_code: Option<ReturnCode>,
    pub data: Option<String>,
    pub error: Option<String>,
    pub sent: Option<DateTime<Local>>,
    pub received: Option<DateTime<Local>>,
}

impl CommandRecord {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            return_code: None,
            data: None,
            error: None,
            sent: None,
            received: None,
        }
    }

    pub fn mark_sent(&mut self) {
        self.sent = Some(Local::now());
    }

    pub fn mark_received(&mut self, return_code: ReturnCode, data: &str) {
        self.received = Some(Local::now());
        self.return_code = Some(return_code);
        self.data = Some(data.to_string());
    }

    pub fn is_sent(&self) -> bool {
        self.sent.is_some()
    }

    pub fn has_response(&self) -> bool {
        self.return_code.is_some()
    }

    /// Round trip time in milliseconds
    pub fn ping_ms(&self) -> Option<f64> {
        match (self.sent, self.received) {
            (Some(sent), Some(received)) => {
                Some((received - sent).num_microseconds().unwrap_or(i64::MAX) as f64 / 1000.0)
            }
            _ => None,
        }
    }
}

impl fmt::Display for CommandRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let command = self.command.trim_end();
        match (self.return_code, self.sent) {
            (Some(code), Some(sent)) => {
                write!(
                    f,
                    "[{}] {:?} -> {:?}",
                    code,
                    command,
                    self.data.as_deref().unwrap_or("")
                )?;
                if let Some(error) = &self.error {
                    write!(f, " ({})", error)?;
                }
                let received = self
                    .received
                    .map(|t| t.format("%H:%M:%S%.6f").to_string())
                    .unwrap_or_default();
                write!(
                    f,
                    " <{} -> {} ping={:.3}ms>",
                    sent.format("%H:%M:%S%.6f"),
                    received,
                    self.ping_ms().unwrap_or(f64::INFINITY)
                )
            }
            (None, Some(sent)) => match &self.error {
                Some(error) => write!(
                    f,
                    "[FAILED] {:?} ({}) <{}>",
                    command,
                    error,
                    sent.format("%H:%M:%S%.6f")
                ),
                None => write!(f, "[WAIT] {:?} -> <{}>", command, sent.format("%H:%M:%S%.6f")),
            },
            _ => write!(f, "[PENDING] {:?}", command),
        }
    }
}

/// Valid range of an integer camera property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRange {
    pub min: i64,
    pub max: i64,
}

impl PropertyRange {
    pub fn clamp(&self, value: i64) -> i64 {
        value.clamp(self.min, self.max)
    }
}

/// 8 bit gray scale image, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u8>,
}

impl GrayImage {
    pub fn new(width: usize, height: usize, pixels: Vec<u8>) -> Result<Self, DomainError> {
        if pixels.len() != width * height {
            return Err(DomainError::Device(format!(
                "Image of {}x{} needs {} pixels, got {}",
                width,
                height,
                width * height,
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn mean(&self) -> f64 {
        if self.pixels.is_empty() {
            return 0.0;
        }
        self.pixels.iter().map(|&p| p as f64).sum::<f64>() / self.pixels.len() as f64
    }

    /// Binary PGM (P5) encoding
    pub fn to_pgm(&self) -> Vec<u8> {
        let mut bytes = format!("P5\n{} {}\n255\n", self.width, self.height).into_bytes();
        bytes.extend_from_slice(&self.pixels);
        bytes
    }
}

/// Port for a camera with GenICam style integer properties
#[async_trait]
pub trait CameraPort: Send + Sync {
    async fn get_property(&self, name: &str) -> Result<i64, DomainError>;

    async fn set_property(&self, name: &str, value: i64) -> Result<(), DomainError>;

    async fn property_range(&self, name: &str) -> Result<PropertyRange, DomainError>;

    /// Names and values of the device info fields (family, product, serial, ...)
    async fn device_info(&self) -> Result<Vec<(String, String)>, DomainError>;

    async fn grab_image(&self) -> Result<GrayImage, DomainError>;
}

/// Interfaces of the photoresin layer found at one lateral position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerResult {
    pub z_lower: f64,
    pub dz_lower: f64,
    pub z_upper: f64,
    pub dz_upper: f64,
    /// Uuid of the container holding the raw scan
    pub layer_uuid: String,
}

/// Port for the detector of the lower and upper resin interfaces
#[async_trait]
pub trait LayerDetectorPort: Send + Sync {
    /// Scan at (x, y) between the estimates `z_lower` and `z_upper` with step `dz`
    async fn detect(
        &self,
        x: f64,
        y: f64,
        z_lower: f64,
        z_upper: f64,
        dz: f64,
    ) -> Result<LayerResult, DomainError>;

    /// Current stage position
    async fn position(&self) -> Result<Point3D, DomainError>;

    async fn move_to(&self, position: Point3D) -> Result<(), DomainError>;
}

/// Port for configuration management
#[async_trait]
pub trait ConfigPort: Send + Sync {
    /// Get configuration value
    async fn get_config(&self, key: &str) -> Result<Option<String>, DomainError>;

    /// Get configuration value with default
    async fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, DomainError>;

    /// Set configuration value
    async fn set_config(&self, key: &str, value: &str) -> Result<(), DomainError>;

    /// Load configuration from file
    async fn load_config(&self, file_path: &str) -> Result<(), DomainError>;

    /// Save configuration to file
    async fn save_config(&self, file_path: &str) -> Result<(), DomainError>;

    /// Load default configuration
    async fn load_default_config(&self) -> Result<(), DomainError>;

    /// Validate configuration
    async fn validate_config(&self) -> Result<(), DomainError>;

    /// Get all configuration keys
    async fn get_all_config_keys(&self) -> Result<Vec<String>, DomainError>;

    /// Clear all configuration
    async fn clear_config(&self) -> Result<(), DomainError>;

    /// Get configuration file path
    async fn get_config_file_path(&self) -> Result<String, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_record_display() {
        let mut record = CommandRecord::new("ENABLE X\n");
        assert_eq!(record.to_string(), "[PENDING] \"ENABLE X\"");

        record.mark_sent();
        assert!(record.to_string().starts_with("[WAIT] \"ENABLE X\" -> <"));

        record.mark_received(ReturnCode::Fault, "");
        record.error = Some("Axis already enabled".to_string());
        let text = record.to_string();
        assert!(text.starts_with("[FAULT] \"ENABLE X\" -> \"\" (Axis already enabled) <"));
        assert!(text.contains("ping="));
        assert!(record.ping_ms().unwrap() >= 0.0);
    }

    #[test]
    fn test_command_record_without_response() {
        let mut record = CommandRecord::new("~VERSION\n");
        record.mark_sent();
        record.error = Some("No response".to_string());
        assert!(record.to_string().starts_with("[FAILED] \"~VERSION\" (No response) <"));
        assert!(!record.has_response());
        assert_eq!(record.ping_ms(), None);
    }

    #[test]
    fn test_gray_image() {
        assert!(GrayImage::new(2, 2, vec![0; 3]).is_err());
        let image = GrayImage::new(2, 1, vec![10, 30]).unwrap();
        assert_eq!(image.mean(), 20.0);
        assert_eq!(image.to_pgm(), b"P5\n2 1\n255\n\x0a\x1e".to_vec());
    }
}
