// Simulated camera adapter - Sensor model for dummy mode and tests

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::trace;

use crate::domain::errors::DomainError;
use crate::ports::{CameraPort, GrayImage, PropertyRange};

pub const SENSOR_WIDTH: i64 = 1280;
pub const SENSOR_HEIGHT: i64 = 1024;

/// Camera whose mean gray value grows linearly with the exposure time
pub struct SimulatedCameraAdapter {
    /// Gray value per microsecond of exposure
    sensitivity: f64,
    properties: Mutex<BTreeMap<String, (i64, PropertyRange)>>,
}

impl SimulatedCameraAdapter {
    pub fn new(sensitivity: f64) -> Self {
        let mut properties = BTreeMap::new();
        let mut add = |name: &str, value: i64, min: i64, max: i64| {
            properties.insert(name.to_string(), (value, PropertyRange { min, max }));
        };
        add("Width", SENSOR_WIDTH, 16, SENSOR_WIDTH);
        add("Height", SENSOR_HEIGHT, 16, SENSOR_HEIGHT);
        add("OffsetX", 0, 0, SENSOR_WIDTH - 16);
        add("OffsetY", 0, 0, SENSOR_HEIGHT - 16);
        add("ExposureTime", 20000, 10, 10_000_000);
        add("ExposureAuto", 0, 0, 1);
        add("Gain", 0, 0, 24);
        Self {
            sensitivity,
            properties: Mutex::new(properties),
        }
    }
}

impl Default for SimulatedCameraAdapter {
    /// Mean value 127 at 25 ms
    fn default() -> Self {
        Self::new(127.0 / 25000.0)
    }
}

#[async_trait]
impl CameraPort for SimulatedCameraAdapter {
    async fn get_property(&self, name: &str) -> Result<i64, DomainError> {
        self.properties
            .lock()
            .await
            .get(name)
            .map(|(value, _)| *value)
            .ok_or_else(|| DomainError::NotFound(format!("Camera property '{}'", name)))
    }

    async fn set_property(&self, name: &str, value: i64) -> Result<(), DomainError> {
        let mut properties = self.properties.lock().await;
        let (current, range) = properties
            .get_mut(name)
            .ok_or_else(|| DomainError::NotFound(format!("Camera property '{}'", name)))?;
        if value < range.min || value > range.max {
            return Err(DomainError::Device(format!(
                "{} = {} is outside [{}, {}]",
                name, value, range.min, range.max
            )));
        }
        *current = value;
        Ok(())
    }

    async fn property_range(&self, name: &str) -> Result<PropertyRange, DomainError> {
        self.properties
            .lock()
            .await
            .get(name)
            .map(|(_, range)| *range)
            .ok_or_else(|| DomainError::NotFound(format!("Camera property '{}'", name)))
    }

    async fn device_info(&self) -> Result<Vec<(String, String)>, DomainError> {
        Ok(vec![
            ("family".to_string(), "simulated".to_string()),
            ("product".to_string(), "SimulatedCamera".to_string()),
            ("serial".to_string(), "00000000".to_string()),
            ("id".to_string(), "0".to_string()),
        ])
    }

    async fn grab_image(&self) -> Result<GrayImage, DomainError> {
        let (width, height, exposure) = {
            let properties = self.properties.lock().await;
            let value = |name: &str| properties.get(name).map(|(v, _)| *v).unwrap_or(0);
            (value("Width"), value("Height"), value("ExposureTime"))
        };
        let level = (exposure as f64 * self.sensitivity).round().clamp(0.0, 255.0) as u8;
        trace!(exposure, level, "Simulated image");
        let (width, height) = (width.max(0) as usize, height.max(0) as usize);
        GrayImage::new(width, height, vec![level; width * height])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mean_follows_exposure() {
        let camera = SimulatedCameraAdapter::default();
        camera.set_property("ExposureTime", 25000).await.unwrap();
        let image = camera.grab_image().await.unwrap();
        assert_eq!(image.width, SENSOR_WIDTH as usize);
        assert_eq!(image.mean(), 127.0);

        camera.set_property("ExposureTime", 1_000_000).await.unwrap();
        assert_eq!(camera.grab_image().await.unwrap().mean(), 255.0);
    }

    #[tokio::test]
    async fn test_property_limits() {
        let camera = SimulatedCameraAdapter::default();
        assert!(camera.set_property("Width", 4096).await.is_err());
        assert!(camera.get_property("Brightness").await.is_err());
        assert_eq!(
            camera.property_range("ExposureTime").await.unwrap(),
            PropertyRange { min: 10, max: 10_000_000 }
        );
    }
}
