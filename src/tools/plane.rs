//! Resin interface planes
//!
//! [`PlaneFit`] fits `z = a·x + b·y + c` to measured interface heights.
//! [`PlaneScan`] collects interface detections at several lateral positions
//! and fits the lower and upper interface planes of the resin layer.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::info;

use super::linalg::least_squares;
use crate::container::{ContainerMeta, DataContainer};
use crate::domain::coordinate_system::ZFunction;
use crate::domain::errors::DomainError;
use crate::ports::LayerDetectorPort;
use crate::settings::ParameterSet;

/// Least squares plane through a set of points
#[derive(Debug, Clone, PartialEq)]
pub struct PlaneFit {
    points: Vec<[f64; 3]>,
    params: [f64; 3],
    deviations: Vec<f64>,
    average: f64,
    slope: f64,
    theta: f64,
    phi: f64,
}

impl PlaneFit {
    /// Fit the plane; needs at least three points that are not collinear
    pub fn from_points(points: &[[f64; 3]]) -> Result<Self, DomainError> {
        if points.len() < 3 {
            return Err(DomainError::Geometry(format!(
                "Plane fit needs at least 3 points, got {}",
                points.len()
            )));
        }
        let rows: Vec<Vec<f64>> = points.iter().map(|p| vec![p[0], p[1], 1.0]).collect();
        let z: Vec<f64> = points.iter().map(|p| p[2]).collect();
        let params = least_squares(&rows, &z).map_err(|_| {
            DomainError::Geometry("Plane fit points are collinear".to_string())
        })?;
        Ok(Self::with_params(points, [params[0], params[1], params[2]]))
    }

    /// Plane with known parameters evaluated against `points`
    pub fn with_params(points: &[[f64; 3]], params: [f64; 3]) -> Self {
        let deviations: Vec<f64> = points
            .iter()
            .map(|p| params[0] * p[0] + params[1] * p[1] + params[2] - p[2])
            .collect();
        let average = if deviations.is_empty() {
            0.0
        } else {
            deviations.iter().map(|d| d * d).sum::<f64>().sqrt() / deviations.len() as f64
        };

        let [nx, ny, nz] = [-params[0], -params[1], 1.0];
        let rxy = nx.hypot(ny);
        // azimuth of a level plane is undefined
        let mut phi = if rxy == 0.0 { 0.0 } else { ny.atan2(nx).to_degrees() };
        while phi > 180.0 {
            phi -= 360.0;
        }
        while phi <= -180.0 {
            phi += 360.0;
        }

        Self {
            points: points.to_vec(),
            params,
            deviations,
            average,
            slope: rxy / nz,
            theta: rxy.atan2(nz).to_degrees(),
            phi,
        }
    }

    /// (x slope, y slope, z offset)
    pub fn params(&self) -> [f64; 3] {
        self.params
    }

    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    /// Fitted minus measured z for every point
    pub fn deviations(&self) -> &[f64] {
        &self.deviations
    }

    pub fn average(&self) -> f64 {
        self.average
    }

    pub fn max_deviation(&self) -> f64 {
        self.deviations.iter().fold(0.0, |m, d| m.max(d.abs()))
    }

    /// Surface normal (not normalised)
    pub fn normal(&self) -> [f64; 3] {
        [-self.params[0], -self.params[1], 1.0]
    }

    /// Gradient magnitude
    pub fn slope(&self) -> f64 {
        self.slope
    }

    /// Polar angle of the normal in degrees
    pub fn theta_degree(&self) -> f64 {
        self.theta
    }

    /// Azimuth of the normal in degrees, in (-180, 180]
    pub fn phi_degree(&self) -> f64 {
        self.phi
    }

    pub fn z_at(&self, x: f64, y: f64) -> f64 {
        self.params[0] * x + self.params[1] * y + self.params[2]
    }

    pub fn vec_at(&self, x: f64, y: f64) -> [f64; 3] {
        [x, y, self.z_at(x, y)]
    }

    pub fn z_function(&self) -> ZFunction {
        ZFunction::Plane {
            x_slope: self.params[0],
            y_slope: self.params[1],
            z0: self.params[2],
        }
    }

    /// Log every result line, optionally preceded by `name`
    pub fn log_results(&self, name: Option<&str>) {
        for line in self.to_string().lines() {
            match name {
                Some(name) => info!("{} {}", name, line),
                None => info!("{}", line),
            }
        }
    }

    pub fn summary(&self) -> PlaneSummary {
        PlaneSummary {
            x_slope: self.params[0],
            y_slope: self.params[1],
            z0: self.params[2],
            avg_deviation: self.average,
            max_deviation: self.max_deviation(),
            gradient: self.slope,
            polar_angle: self.theta,
            azimuth_angle: self.phi,
            points: self.points.clone(),
        }
    }
}

impl fmt::Display for PlaneFit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "polar angle:    {:.1}° ({:.2} %)",
            self.theta,
            100.0 * self.slope
        )?;
        writeln!(f, "azimuth angle:  {:.1}°", self.phi)?;
        write!(
            f,
            "mean deviation: {:.3} µm (max. {:.3} µm)",
            self.average,
            self.max_deviation()
        )
    }
}

/// Serialized result of one fitted plane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaneSummary {
    pub x_slope: f64,
    pub y_slope: f64,
    pub z0: f64,
    pub avg_deviation: f64,
    pub max_deviation: f64,
    pub gradient: f64,
    pub polar_angle: f64,
    pub azimuth_angle: f64,
    pub points: Vec<[f64; 3]>,
}

/// Lower and upper interface planes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaneResults {
    pub lower: PlaneSummary,
    pub upper: PlaneSummary,
}

/// One interface detection of a scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaneStep {
    pub scan: usize,
    pub x: f64,
    pub y: f64,
    pub z_lower_init: f64,
    pub z_lower: f64,
    pub dz_lower: f64,
    pub z_upper_init: f64,
    pub z_upper: f64,
    pub dz_upper: f64,
    pub dz_init: f64,
    pub layer_uuid: String,
}

pub const PLANE_CONTAINER_TYPE: &str = "LayerPlane";
pub const PLANE_CONTAINER_VERSION: f64 = 1.1;

fn plane_defaults() -> Map<String, Value> {
    let mut defaults = Map::new();
    defaults.insert("dzCoarseDefault".to_string(), json!(100.0));
    defaults.insert("dzFineDefault".to_string(), json!(10.0));
    defaults
}

/// Detects the resin interfaces at several positions and fits both planes
pub struct PlaneScan {
    detector: Arc<dyn LayerDetectorPort>,
    params: ParameterSet,
    z_lower: f64,
    z_upper: f64,
    steps: Vec<PlaneStep>,
}

impl PlaneScan {
    /// Scanner starting from the interface estimates `z_lower` and `z_upper`
    pub fn new(
        detector: Arc<dyn LayerDetectorPort>,
        z_lower: f64,
        z_upper: f64,
        overrides: Map<String, Value>,
    ) -> Result<Self, DomainError> {
        let params = ParameterSet::new(plane_defaults(), overrides)?;
        info!("Initialized plane detector.");
        Ok(Self {
            detector,
            params,
            z_lower,
            z_upper,
            steps: Vec::new(),
        })
    }

    pub fn steps(&self) -> &[PlaneStep] {
        &self.steps
    }

    pub fn parameters(&self) -> Map<String, Value> {
        self.params.parameters()
    }

    /// Current (lower, upper) estimates
    pub fn estimates(&self) -> (f64, f64) {
        (self.z_lower, self.z_upper)
    }

    /// Detect the interfaces at (x, y); with `home` the stage returns to where it was
    pub async fn run(&mut self, x: f64, y: f64, home: bool) -> Result<&PlaneStep, DomainError> {
        let scan = self.steps.len();
        let start = self.detector.position().await?;

        // coarse search until both interfaces have been told apart
        let dz = if self.z_lower == self.z_upper {
            self.params.f64("dzCoarseDefault")?
        } else {
            self.params.f64("dzFineDefault")?
        };
        let result = self
            .detector
            .detect(x, y, self.z_lower, self.z_upper, dz)
            .await?;
        info!(
            scan,
            x,
            y,
            z_lower = result.z_lower,
            z_upper = result.z_upper,
            "Layer interfaces detected"
        );

        self.steps.push(PlaneStep {
            scan,
            x,
            y,
            z_lower_init: self.z_lower,
            z_lower: result.z_lower,
            dz_lower: result.dz_lower,
            z_upper_init: self.z_upper,
            z_upper: result.z_upper,
            dz_upper: result.dz_upper,
            dz_init: dz,
            layer_uuid: result.layer_uuid,
        });
        self.z_lower = result.z_lower;
        self.z_upper = result.z_upper;

        if home {
            self.detector.move_to(start).await?;
        }
        self.steps
            .last()
            .ok_or_else(|| DomainError::NotFound("plane step".to_string()))
    }

    /// Fit both planes to the steps so far
    pub fn results(&self) -> Result<PlaneResults, DomainError> {
        let lower: Vec<[f64; 3]> = self.steps.iter().map(|s| [s.x, s.y, s.z_lower]).collect();
        let upper: Vec<[f64; 3]> = self.steps.iter().map(|s| [s.x, s.y, s.z_upper]).collect();
        let lower = PlaneFit::from_points(&lower)?;
        lower.log_results(Some("Lower"));
        let upper = PlaneFit::from_points(&upper)?;
        upper.log_results(Some("Upper"));
        Ok(PlaneResults {
            lower: lower.summary(),
            upper: upper.summary(),
        })
    }

    /// Package steps and fitted planes; the steps are consumed
    pub fn container(
        &mut self,
        author: Option<String>,
        email: Option<String>,
    ) -> Result<DataContainer, DomainError> {
        if self.steps.is_empty() {
            return Err(DomainError::Calibration("No results!".to_string()));
        }
        let result = self.results()?;
        let steps = std::mem::take(&mut self.steps);

        let references: BTreeMap<String, String> = steps
            .iter()
            .map(|s| (format!("scan-{:02}", s.scan), s.layer_uuid.clone()))
            .collect();

        let meta = ContainerMeta::new(
            "Plane Detection Data",
            "Detection of upper and lower photoresin interface planes.",
        )
        .with_author(author, email);
        let mut container = DataContainer::new(PLANE_CONTAINER_TYPE, PLANE_CONTAINER_VERSION, meta)?;
        container.insert_json("references.json", &references)?;
        container.insert_json("data/plane.json", &self.params.parameters())?;
        container.insert_json("meas/steps.json", &steps)?;
        container.insert_json("meas/result.json", &result)?;
        Ok(container)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SimulatedLayerAdapter;
    use crate::domain::geometry::Point3D;

    fn tilted_points() -> Vec<[f64; 3]> {
        // z = 0.01 x - 0.02 y + 5
        [[0.0, 0.0], [100.0, 0.0], [0.0, 100.0], [100.0, 100.0], [50.0, 25.0]]
            .iter()
            .map(|&[x, y]| [x, y, 0.01 * x - 0.02 * y + 5.0])
            .collect()
    }

    #[test]
    fn test_exact_plane_fit() {
        let fit = PlaneFit::from_points(&tilted_points()).unwrap();
        let [a, b, c] = fit.params();
        assert!((a - 0.01).abs() < 1e-9);
        assert!((b + 0.02).abs() < 1e-9);
        assert!((c - 5.0).abs() < 1e-9);
        assert!(fit.max_deviation() < 1e-9);
        assert!((fit.slope() - 0.05_f64.sqrt() / 10.0).abs() < 1e-9);
        assert!((fit.z_at(10.0, 10.0) - 4.9).abs() < 1e-9);
        assert_eq!(fit.vec_at(0.0, 0.0)[2], fit.z_at(0.0, 0.0));
        // normal (-0.01, 0.02, 1) points into the second quadrant
        assert!(fit.phi_degree() > 90.0 && fit.phi_degree() < 180.0);
    }

    #[test]
    fn test_level_plane() {
        let points = [[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [0.0, 1.0, 1.0]];
        let fitted = PlaneFit::from_points(&points).unwrap();
        assert!(fitted.theta_degree().abs() < 1e-9);
        assert!((fitted.z_at(3.0, -2.0) - 1.0).abs() < 1e-9);

        let fit = PlaneFit::with_params(&points, [0.0, 0.0, 1.0]);
        assert_eq!(fit.theta_degree(), 0.0);
        assert_eq!(fit.slope(), 0.0);
        assert_eq!(
            fit.to_string(),
            "polar angle:    0.0° (0.00 %)\nazimuth angle:  0.0°\nmean deviation: 0.000 µm (max. 0.000 µm)"
        );
        assert_eq!(
            fit.z_function(),
            ZFunction::Plane {
                x_slope: 0.0,
                y_slope: 0.0,
                z0: 1.0
            }
        );
    }

    #[test]
    fn test_deviation_statistics() {
        let points = [
            [0.0, 0.0, 1.0],
            [1.0, 0.0, -1.0],
            [0.0, 1.0, -1.0],
            [1.0, 1.0, 1.0],
        ];
        let fit = PlaneFit::with_params(&points, [0.0, 0.0, 0.0]);
        assert_eq!(fit.average(), 1.0);
        assert_eq!(fit.max_deviation(), 1.0);
        assert_eq!(fit.deviations(), &[-1.0, 1.0, 1.0, -1.0]);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(PlaneFit::from_points(&[[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]]).is_err());
        let collinear = [[0.0, 0.0, 0.0], [1.0, 1.0, 1.0], [2.0, 2.0, 2.0]];
        assert!(PlaneFit::from_points(&collinear).is_err());
    }

    fn scanner(z_lower: f64, z_upper: f64) -> (Arc<SimulatedLayerAdapter>, PlaneScan) {
        let detector = Arc::new(SimulatedLayerAdapter::new(
            ZFunction::Plane {
                x_slope: 0.1,
                y_slope: 0.0,
                z0: 1000.0,
            },
            ZFunction::Plane {
                x_slope: 0.1,
                y_slope: 0.0,
                z0: 1050.0,
            },
        ));
        let scan = PlaneScan::new(detector.clone(), z_lower, z_upper, Map::new()).unwrap();
        (detector, scan)
    }

    #[tokio::test]
    async fn test_scan_uses_coarse_then_fine_steps() {
        let (detector, mut scan) = scanner(1000.0, 1000.0);
        detector.move_to(Point3D::new(1.0, 2.0, 3.0)).await.unwrap();

        let first = scan.run(0.0, 0.0, true).await.unwrap().clone();
        assert_eq!(first.dz_init, 100.0);
        assert_eq!(detector.position().await.unwrap(), Point3D::new(1.0, 2.0, 3.0));

        let second = scan.run(100.0, 0.0, false).await.unwrap().clone();
        assert_eq!(second.dz_init, 10.0);
        assert_eq!(second.z_lower_init, first.z_lower);
        assert_eq!(scan.estimates(), (second.z_lower, second.z_upper));
    }

    #[tokio::test]
    async fn test_scan_container() {
        let (_, mut scan) = scanner(1000.0, 1050.0);
        assert!(scan.container(None, None).is_err());

        for (x, y) in [(0.0, 0.0), (100.0, 0.0), (0.0, 100.0), (100.0, 100.0)] {
            scan.run(x, y, false).await.unwrap();
        }
        let container = scan.container(Some("Tester".to_string()), None).unwrap();
        container
            .validate_type(PLANE_CONTAINER_TYPE, PLANE_CONTAINER_VERSION)
            .unwrap();
        let result: PlaneResults = container.json_as("meas/result.json").unwrap();
        assert!((result.lower.x_slope - 0.1).abs() < 1e-9);
        assert!((result.upper.z0 - result.lower.z0 - 50.0).abs() < 1e-9);
        assert_eq!(container.json("references.json").unwrap().as_object().unwrap().len(), 4);
        assert_eq!(container.json("data/plane.json").unwrap()["dzCoarseDefault"], 100.0);

        // steps are consumed
        assert!(scan.steps().is_empty());
        assert!(scan.container(None, None).is_err());
    }
}
