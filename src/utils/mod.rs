//! Common utilities and helpers

use std::time::Duration;

pub mod logging;
pub mod path;

/// Formatting helpers for console output
pub struct Utils;

impl Utils {
    /// Format duration for display
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;
        let milliseconds = duration.subsec_millis();

        if hours > 0 {
            format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, milliseconds)
        } else {
            format!("{:02}:{:02}.{:03}", minutes, seconds, milliseconds)
        }
    }

    /// Format a length given in millimetres with a readable unit
    pub fn format_length(mm: f64) -> String {
        let magnitude = mm.abs();
        if magnitude >= 1.0 || magnitude == 0.0 {
            format!("{:.3} mm", mm)
        } else if magnitude >= 1e-3 {
            format!("{:.3} µm", mm * 1e3)
        } else {
            format!("{:.1} nm", mm * 1e6)
        }
    }

    /// Format file size for display
    pub fn format_file_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(Utils::format_duration(Duration::from_millis(61_250)), "01:01.250");
        assert_eq!(Utils::format_duration(Duration::from_secs(3_723)), "01:02:03.000");
    }

    #[test]
    fn test_format_length() {
        assert_eq!(Utils::format_length(1.5), "1.500 mm");
        assert_eq!(Utils::format_length(0.0), "0.000 mm");
        assert_eq!(Utils::format_length(0.0125), "12.500 µm");
        assert_eq!(Utils::format_length(-2.5e-3), "-2.500 µm");
        assert_eq!(Utils::format_length(-2.5e-4), "-250.0 nm");
        assert_eq!(Utils::format_length(5e-7), "0.5 nm");
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(Utils::format_file_size(512), "512 B");
        assert_eq!(Utils::format_file_size(2048), "2.00 KB");
    }
}
