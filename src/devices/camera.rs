//! Microscope camera service
//!
//! Wraps a [`CameraPort`] with the area of interest handling, the exposure
//! time optimisation and image containers.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::container::{ContainerMeta, DataContainer};
use crate::domain::errors::DomainError;
use crate::domain::geometry::Point3D;
use crate::ports::{CameraPort, GrayImage};
use crate::settings::ParameterSet;

pub const IMAGE_CONTAINER_TYPE: &str = "CameraImage";
pub const IMAGE_CONTAINER_VERSION: f64 = 1.1;

/// Exposure time the optimisation starts from (µs)
const EXPOSURE_START: f64 = 20000.0;
/// Lower end of the upper bracket search (µs)
const EXPOSURE_UPPER_START: f64 = 30000.0;
/// Longest exposure the optimisation considers (µs)
const EXPOSURE_LIMIT: f64 = 100000.0;
/// Bracket width at which the regula falsi stops (µs)
const EXPOSURE_TOLERANCE: f64 = 10.0;
const MAX_ITERATIONS: usize = 100;

/// Section keys that select the device instead of configuring it
const DEVICE_KEYS: [&str; 2] = ["product", "deviceID"];

fn camera_defaults() -> Map<String, Value> {
    match json!({
        "ExposureTime": 20000,
        "ExposureAuto": 0,
        "Gain": 0,
    }) {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

pub struct Camera {
    port: Arc<dyn CameraPort>,
    objective: Map<String, Value>,
    params: ParameterSet,
    size: (i64, i64),
}

impl Camera {
    /// Apply the camera parameters and select the full sensor
    pub async fn open(
        port: Arc<dyn CameraPort>,
        objective: Map<String, Value>,
        mut section: Map<String, Value>,
    ) -> Result<Self, DomainError> {
        for key in DEVICE_KEYS {
            section.remove(key);
        }
        let params = ParameterSet::new(camera_defaults(), section)?;
        info!("Initializing camera.");

        for (key, value) in params.parameters() {
            let value = value.as_i64().ok_or_else(|| {
                DomainError::Config(format!("Camera parameter {} must be an integer", key))
            })?;
            port.set_property(&key, value).await?;
        }

        let mut camera = Self {
            port,
            objective,
            params,
            size: (0, 0),
        };
        camera.set_aoi(None).await?;
        info!("Initialized camera.");
        Ok(camera)
    }

    /// Current image size (width, height)
    pub fn size(&self) -> (i64, i64) {
        self.size
    }

    pub fn parameters(&self) -> Map<String, Value> {
        self.params.parameters()
    }

    /// Centre a square of `size` pixels on the sensor, or use the full sensor
    pub async fn set_aoi(&mut self, size: Option<i64>) -> Result<(i64, i64), DomainError> {
        self.port.set_property("OffsetX", 0).await?;
        self.port.set_property("OffsetY", 0).await?;
        let width = self.port.property_range("Width").await?;
        let height = self.port.property_range("Height").await?;

        self.size = match size {
            None => {
                self.port.set_property("Width", width.max).await?;
                self.port.set_property("Height", height.max).await?;
                (width.max, height.max)
            }
            Some(size) => {
                let size = size.max(width.min).max(height.min);
                let size = size.min(width.max).min(height.max);
                self.port.set_property("Width", size).await?;
                self.port.set_property("Height", size).await?;
                self.port
                    .set_property("OffsetX", (width.max - size) / 2)
                    .await?;
                self.port
                    .set_property("OffsetY", (height.max - size) / 2)
                    .await?;
                (size, size)
            }
        };
        debug!(width = self.size.0, height = self.size.1, "Area of interest");
        Ok(self.size)
    }

    pub async fn grab_image(&self) -> Result<GrayImage, DomainError> {
        self.port.grab_image().await
    }

    async fn set_exposure(&mut self, exposure: f64) -> Result<(), DomainError> {
        let exposure = exposure.round() as i64;
        self.port.set_property("ExposureTime", exposure).await?;
        self.params.set("ExposureTime", json!(exposure))
    }

    /// Mean image value minus the goal at the given exposure
    async fn exposure_error(&mut self, exposure: f64, level: f64) -> Result<f64, DomainError> {
        self.set_exposure(exposure).await?;
        Ok(self.grab_image().await?.mean() - level)
    }

    /// Find the exposure time giving a mean image value of `level`
    pub async fn optimize_exposure(&mut self, level: u8) -> Result<(GrayImage, f64), DomainError> {
        info!("Start exposure time optimization.");
        let goal = f64::from(level);
        self.port.set_property("ExposureAuto", 0).await?;
        let range = self.port.property_range("ExposureTime").await?;
        let failed = || DomainError::Device("Optimization failed!".to_string());

        // lower bracket: image too dark
        let t_min = range.min as f64;
        let mut t0 = EXPOSURE_START;
        let mut y0 = self.exposure_error(t0, goal).await?;
        while y0 >= 0.0 {
            if t0 <= t_min + 100.0 {
                return Err(failed());
            }
            t0 = t_min + 0.9 * (t0 - t_min);
            y0 = self.exposure_error(t0, goal).await?;
        }

        // upper bracket: image too bright
        let t_max = EXPOSURE_LIMIT.min(range.max as f64);
        let mut t1 = EXPOSURE_UPPER_START;
        let mut y1 = self.exposure_error(t1, goal).await?;
        while y1 <= 0.0 {
            if t1 >= t_max - 100.0 {
                return Err(failed());
            }
            t1 = t_max - 0.1 * (t_max - t1);
            y1 = self.exposure_error(t1, goal).await?;
        }

        let mut iterations = 0;
        let t = loop {
            if t1 - t0 <= EXPOSURE_TOLERANCE {
                break 0.5 * (t0 + t1);
            }
            if iterations == MAX_ITERATIONS {
                return Err(failed());
            }
            iterations += 1;
            let t = t0 - y0 * (t1 - t0) / (y1 - y0);
            let y = self.exposure_error(t, goal).await?;
            if y < 0.0 {
                t0 = t;
                y0 = y;
            } else if y > 0.0 {
                t1 = t;
                y1 = y;
            } else {
                break t;
            }
        };

        self.set_exposure(t).await?;
        let image = self.grab_image().await?;
        info!(
            "Optimized exposure time: {:.3} ms, mean image value: {:.1} (goal: {})",
            0.001 * t,
            image.mean(),
            level
        );
        Ok((image, t))
    }

    /// Device family, product, serial number and id
    pub async fn info(&self) -> Result<Map<String, Value>, DomainError> {
        Ok(self
            .port
            .device_info()
            .await?
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect())
    }

    /// Grab an image and package it with the camera and objective parameters
    pub async fn image_container(
        &self,
        location: Option<Point3D>,
        author: Option<String>,
        email: Option<String>,
    ) -> Result<DataContainer, DomainError> {
        let image = self.grab_image().await?;
        let meta = ContainerMeta::new(
            "Microscope Camera Image",
            "Camera image from the microscope camera.",
        )
        .with_author(author, email);
        let mut container = DataContainer::new(IMAGE_CONTAINER_TYPE, IMAGE_CONTAINER_VERSION, meta)?;
        container.insert_bytes("meas/image.pgm", image.to_pgm());
        container.insert_json("data/camera.json", &self.parameters())?;
        container.insert_json("data/objective.json", &self.objective)?;
        if let Some(location) = location {
            container.insert_json("data/location.json", &location)?;
        }
        Ok(container)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::simulated_camera::{SENSOR_HEIGHT, SENSOR_WIDTH};
    use crate::adapters::SimulatedCameraAdapter;

    async fn camera(sensitivity: f64) -> (Arc<SimulatedCameraAdapter>, Camera) {
        let port = Arc::new(SimulatedCameraAdapter::new(sensitivity));
        let mut section = Map::new();
        section.insert("product".to_string(), json!("mvBlueFOX3"));
        section.insert("Gain".to_string(), json!(2));
        let camera = Camera::open(port.clone(), Map::new(), section).await.unwrap();
        (port, camera)
    }

    #[tokio::test]
    async fn test_open_applies_parameters() {
        let (port, camera) = camera(0.005).await;
        assert_eq!(port.get_property("Gain").await.unwrap(), 2);
        assert_eq!(camera.size(), (SENSOR_WIDTH, SENSOR_HEIGHT));
    }

    #[tokio::test]
    async fn test_centered_aoi() {
        let (port, mut camera) = camera(0.005).await;
        assert_eq!(camera.set_aoi(Some(512)).await.unwrap(), (512, 512));
        assert_eq!(port.get_property("OffsetX").await.unwrap(), (SENSOR_WIDTH - 512) / 2);
        assert_eq!(port.get_property("OffsetY").await.unwrap(), (SENSOR_HEIGHT - 512) / 2);

        // clamped to the smaller sensor dimension
        assert_eq!(camera.set_aoi(Some(5000)).await.unwrap(), (SENSOR_HEIGHT, SENSOR_HEIGHT));
        assert_eq!(camera.set_aoi(Some(1)).await.unwrap(), (16, 16));
        assert_eq!(camera.grab_image().await.unwrap().width, 16);
    }

    #[tokio::test]
    async fn test_optimize_exposure() {
        let (port, mut camera) = camera(127.0 / 25000.0).await;
        let (image, exposure) = camera.optimize_exposure(127).await.unwrap();
        assert!((exposure - 25000.0).abs() <= 100.0, "{}", exposure);
        assert!((image.mean() - 127.0).abs() <= 1.0);
        assert_eq!(
            port.get_property("ExposureTime").await.unwrap(),
            exposure.round() as i64
        );
        assert_eq!(camera.parameters()["ExposureTime"], exposure.round() as i64);
    }

    #[tokio::test]
    async fn test_optimize_exposure_fails_without_bracket() {
        // far too sensitive: even the shortest exposure saturates
        let (_, mut camera) = camera(10.0).await;
        assert!(camera.optimize_exposure(127).await.is_err());
    }

    /// Black below `threshold` µs of exposure, white above
    struct StepCamera {
        inner: SimulatedCameraAdapter,
        threshold: i64,
    }

    #[async_trait::async_trait]
    impl CameraPort for StepCamera {
        async fn get_property(&self, name: &str) -> Result<i64, DomainError> {
            self.inner.get_property(name).await
        }

        async fn set_property(&self, name: &str, value: i64) -> Result<(), DomainError> {
            self.inner.set_property(name, value).await
        }

        async fn property_range(
            &self,
            name: &str,
        ) -> Result<crate::ports::PropertyRange, DomainError> {
            self.inner.property_range(name).await
        }

        async fn device_info(&self) -> Result<Vec<(String, String)>, DomainError> {
            self.inner.device_info().await
        }

        async fn grab_image(&self) -> Result<GrayImage, DomainError> {
            let exposure = self.inner.get_property("ExposureTime").await?;
            let value = if exposure < self.threshold { 0 } else { 255 };
            GrayImage::new(4, 4, vec![value; 16])
        }
    }

    #[tokio::test]
    async fn test_optimize_exposure_fails_without_convergence() {
        // the dark end creeps by 1/255 of the bracket per step and never meets the edge
        let port = Arc::new(StepCamera {
            inner: SimulatedCameraAdapter::default(),
            threshold: 90000,
        });
        let mut camera = Camera::open(port, Map::new(), Map::new()).await.unwrap();
        match camera.optimize_exposure(1).await.unwrap_err() {
            DomainError::Device(message) => assert_eq!(message, "Optimization failed!"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_image_container() {
        let (_, mut camera) = camera(0.005).await;
        camera.set_aoi(Some(32)).await.unwrap();
        let container = camera
            .image_container(Some(Point3D::new(1.0, 2.0, 3.0)), None, None)
            .await
            .unwrap();
        container
            .validate_type(IMAGE_CONTAINER_TYPE, IMAGE_CONTAINER_VERSION)
            .unwrap();
        let pgm = container.bytes("meas/image.pgm").unwrap();
        assert!(pgm.starts_with(b"P5\n32 32\n255\n"));
        assert_eq!(pgm.len(), "P5\n32 32\n255\n".len() + 32 * 32);
        assert_eq!(container.json("data/location.json").unwrap()["z"], 3.0);
        assert_eq!(camera.info().await.unwrap()["family"], "simulated");
    }
}
