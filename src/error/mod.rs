//! Error handling module for NanoFactory

use thiserror::Error;

use crate::domain::errors::DomainError;

/// Main error type at the library boundary
#[derive(Error, Debug)]
pub enum NanoFactoryError {
    /// Domain or port failure
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Job file could not be understood
    #[error("Invalid job file {path}: {message}")]
    InvalidJob { path: String, message: String },

    /// Unsupported file type
    #[error("Unsupported file type: {path}")]
    UnsupportedFile { path: String },

    /// Point list could not be read
    #[error("Invalid point list {path}: {message}")]
    InvalidPoints { path: String, message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// TOML error
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Zip archive error
    #[error("Zip error: {0}")]
    ZipError(#[from] zip::result::ZipError),
}

/// Result type alias for NanoFactory operations
pub type NanoResult<T> = std::result::Result<T, NanoFactoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_pass_through() {
        let err: NanoFactoryError = DomainError::NotConnected.into();
        assert_eq!(err.to_string(), DomainError::NotConnected.to_string());
    }

    #[test]
    fn test_conversions() {
        let err: NanoFactoryError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(err.to_string().starts_with("JSON error"));

        let err: NanoFactoryError = toml::from_str::<toml::Table>("= 1").unwrap_err().into();
        assert!(matches!(err, NanoFactoryError::TomlError(_)));
    }
}
