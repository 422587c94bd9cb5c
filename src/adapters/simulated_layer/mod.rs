// Simulated layer adapter - Resin layer between two tilted planes

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::domain::coordinate_system::ZFunction;
use crate::domain::errors::DomainError;
use crate::domain::geometry::Point3D;
use crate::ports::{LayerDetectorPort, LayerResult};

/// Detector reporting the interfaces of a known layer, quantised to the scan step
pub struct SimulatedLayerAdapter {
    lower: ZFunction,
    upper: ZFunction,
    position: Mutex<Point3D>,
}

impl SimulatedLayerAdapter {
    pub fn new(lower: ZFunction, upper: ZFunction) -> Self {
        Self {
            lower,
            upper,
            position: Mutex::new(Point3D::default()),
        }
    }
}

fn quantise(z: f64, dz: f64) -> f64 {
    (z / dz).round() * dz
}

#[async_trait]
impl LayerDetectorPort for SimulatedLayerAdapter {
    async fn detect(
        &self,
        x: f64,
        y: f64,
        z_lower: f64,
        z_upper: f64,
        dz: f64,
    ) -> Result<LayerResult, DomainError> {
        if dz.is_nan() || dz <= 0.0 {
            return Err(DomainError::BadArgs(format!(
                "Scan step must be positive, got {}",
                dz
            )));
        }
        let result = LayerResult {
            z_lower: quantise(self.lower.z_at(x, y), dz),
            dz_lower: dz,
            z_upper: quantise(self.upper.z_at(x, y), dz),
            dz_upper: dz,
            layer_uuid: Uuid::new_v4().to_string(),
        };
        debug!(x, y, z_lower, z_upper, dz, ?result, "Simulated layer scan");
        *self.position.lock().await = Point3D::new(x, y, result.z_upper);
        Ok(result)
    }

    async fn position(&self) -> Result<Point3D, DomainError> {
        Ok(*self.position.lock().await)
    }

    async fn move_to(&self, position: Point3D) -> Result<(), DomainError> {
        *self.position.lock().await = position;
        Ok(())
    }
}
