// Calibration interactor - Attenuator conversion and resin plane fitting

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::container::{ContainerMeta, DataContainer};
use crate::devices::{Attenuator, FitKind};
use crate::domain::geometry::grid_coordinates;
use crate::error::{NanoFactoryError, NanoResult};
use crate::ports::LayerDetectorPort;
use crate::settings::SystemConfig;
use crate::tools::plane::{
    PlaneFit, PlaneResults, PlaneSummary, PLANE_CONTAINER_TYPE, PLANE_CONTAINER_VERSION,
};
use crate::tools::PlaneScan;
use crate::utils::path::PathUtils;

/// System configuration section with attenuator parameters
pub const ATTENUATOR_SECTION: &str = "attenuator";
/// System configuration section with plane scan parameters
pub const PLANE_SECTION: &str = "plane";

#[derive(Debug, Clone, Default)]
pub struct AttenuatorRequest {
    /// Calibration file; the configured one is used when absent
    pub calibration: Option<PathBuf>,
    pub fit: Option<FitKind>,
    pub order: Option<usize>,
    pub value: Option<f64>,
    pub power: Option<f64>,
    pub container: Option<PathBuf>,
    pub user: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttenuatorReport {
    pub steps: usize,
    pub power_min: f64,
    pub power_max: f64,
    /// Power in mW for the requested value
    pub power: Option<f64>,
    /// Value for the requested power
    pub value: Option<f64>,
    pub container: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct PlaneFitRequest {
    /// CSV file with `x,y,z` columns
    pub points: PathBuf,
    pub container: Option<PathBuf>,
    pub user: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaneFitReport {
    pub plane: PlaneSummary,
    pub container: Option<PathBuf>,
}

/// Grid of scan positions and the starting interface estimates
#[derive(Debug, Clone, Default)]
pub struct PlaneScanRequest {
    pub x0: f64,
    pub y0: f64,
    pub dx: f64,
    pub dy: f64,
    pub nx: usize,
    pub ny: usize,
    pub z_lower: f64,
    pub z_upper: f64,
    pub container: Option<PathBuf>,
    pub user: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaneScanReport {
    pub steps: usize,
    pub results: PlaneResults,
    pub container: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct PointRecord {
    x: f64,
    y: f64,
    z: f64,
}

/// Read `x,y,z` rows from a CSV file with a header line
pub fn read_points(path: &Path) -> NanoResult<Vec<[f64; 3]>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_path(path)?;
    let points = reader
        .deserialize::<PointRecord>()
        .map(|row| row.map(|p| [p.x, p.y, p.z]))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| NanoFactoryError::InvalidPoints {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
    debug!(path = %path.display(), points = points.len(), "Points read");
    Ok(points)
}

/// Interactor for device calibrations
pub struct CalibrationInteractor {
    system: Arc<SystemConfig>,
    layer_detector: Arc<dyn LayerDetectorPort>,
}

impl CalibrationInteractor {
    pub fn new(system: Arc<SystemConfig>, layer_detector: Arc<dyn LayerDetectorPort>) -> Self {
        Self {
            system,
            layer_detector,
        }
    }

    fn author(&self, user: Option<&str>) -> NanoResult<(Option<String>, Option<String>)> {
        match user {
            Some(user) => Ok(self.system.author(user)?),
            None => Ok((None, None)),
        }
    }

    fn write_container(container: &mut DataContainer, path: &Path) -> NanoResult<PathBuf> {
        let path = PathUtils::container_path(path);
        container.write(&path)?;
        info!("Container written to {}", path.display());
        Ok(path)
    }

    /// Load the attenuator calibration and convert between value and power
    pub async fn attenuator(&self, request: AttenuatorRequest) -> NanoResult<AttenuatorReport> {
        let mut overrides = self.system.section(ATTENUATOR_SECTION);
        if let Some(fit) = request.fit {
            overrides.insert("fitKind".to_string(), json!(fit));
        }
        if let Some(order) = request.order {
            overrides.insert("polynomialOrder".to_string(), json!(order));
        }

        let attenuator = match &request.calibration {
            Some(path) => {
                PathUtils::require_file(path)?;
                Attenuator::load(path, overrides)?
            }
            None => Attenuator::open(overrides)?,
        };
        let (power_min, power_max) = attenuator.power_range()?;
        let power = request
            .value
            .map(|v| attenuator.value_to_power(v))
            .transpose()?;
        let value = request
            .power
            .map(|p| attenuator.power_to_value(p))
            .transpose()?;

        let container = match &request.container {
            Some(path) => {
                let (author, email) = self.author(request.user.as_deref())?;
                let mut container = attenuator.container(author, email)?;
                Some(Self::write_container(&mut container, path)?)
            }
            None => None,
        };

        Ok(AttenuatorReport {
            steps: attenuator.steps(),
            power_min,
            power_max,
            power,
            value,
            container,
        })
    }

    /// Fit a plane to measured points
    pub async fn plane_fit(&self, request: PlaneFitRequest) -> NanoResult<PlaneFitReport> {
        PathUtils::require_file(&request.points)?;
        let points = read_points(&request.points)?;
        let plane = PlaneFit::from_points(&points)?;
        plane.log_results(PathUtils::get_stem(&request.points).as_deref());

        let container = match &request.container {
            Some(path) => {
                let (author, email) = self.author(request.user.as_deref())?;
                let meta = ContainerMeta::new(
                    "Plane fit",
                    "Plane fitted to measured interface points.",
                )
                .with_author(author, email);
                let mut container =
                    DataContainer::new(PLANE_CONTAINER_TYPE, PLANE_CONTAINER_VERSION, meta)?;
                container.insert_json("data/plane.json", &plane.summary())?;
                container.insert_json("meas/points.json", &json!({ "points": points }))?;
                Some(Self::write_container(&mut container, path)?)
            }
            None => None,
        };

        Ok(PlaneFitReport {
            plane: plane.summary(),
            container,
        })
    }

    /// Detect both resin interfaces on a grid and fit the two planes
    pub async fn plane_scan(&self, request: PlaneScanRequest) -> NanoResult<PlaneScanReport> {
        let positions = grid_coordinates(
            request.x0, request.y0, request.dx, request.dy, request.nx, request.ny,
        );
        let mut scan = PlaneScan::new(
            self.layer_detector.clone(),
            request.z_lower,
            request.z_upper,
            self.system.section(PLANE_SECTION),
        )?;
        for position in &positions {
            scan.run(position.x, position.y, true).await?;
        }
        let results = scan.results()?;
        let steps = scan.steps().len();

        let container = match &request.container {
            Some(path) => {
                let (author, email) = self.author(request.user.as_deref())?;
                let mut container = scan.container(author, email)?;
                Some(Self::write_container(&mut container, path)?)
            }
            None => None,
        };
        info!(steps, "Plane scan finished");

        Ok(PlaneScanReport {
            steps,
            results,
            container,
        })
    }

    /// Plain value of the system configuration
    pub fn system_value(&self, key: &str) -> NanoResult<Value> {
        Ok(self.system.value(key)?.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SimulatedLayerAdapter;
    use crate::devices::attenuator::{encode_calibration, ATTENUATOR_CONTAINER_TYPE};
    use crate::domain::coordinate_system::ZFunction;

    fn interactor(system: &str) -> CalibrationInteractor {
        let detector = Arc::new(SimulatedLayerAdapter::new(
            ZFunction::Plane {
                x_slope: 0.001,
                y_slope: 0.0,
                z0: 1000.0,
            },
            ZFunction::Constant(1050.0),
        ));
        CalibrationInteractor::new(
            Arc::new(SystemConfig::from_json(system).unwrap()),
            detector,
        )
    }

    const SYSTEM: &str = r#"{
        "site": "lab",
        "user:jd": {"name": "J. Doe", "email": "jd@example.org"},
        "attenuator": {"fitKind": "linear"}
    }"#;

    fn calibration_file(dir: &tempfile::TempDir) -> PathBuf {
        let pairs: Vec<[f64; 2]> = (0..=10).map(|i| [i as f64, 2.0 * i as f64]).collect();
        let path = dir.path().join("attenuator.dat");
        std::fs::write(&path, encode_calibration(&pairs)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_attenuator_conversion() {
        let dir = tempfile::tempdir().unwrap();
        let report = interactor(SYSTEM)
            .attenuator(AttenuatorRequest {
                calibration: Some(calibration_file(&dir)),
                value: Some(2.5),
                power: Some(7.0),
                ..AttenuatorRequest::default()
            })
            .await
            .unwrap();
        assert_eq!(report.steps, 11);
        assert_eq!((report.power_min, report.power_max), (0.0, 20.0));
        assert!((report.power.unwrap() - 5.0).abs() < 1e-9);
        assert!((report.value.unwrap() - 3.5).abs() < 1e-9);
        assert_eq!(report.container, None);
    }

    #[tokio::test]
    async fn test_attenuator_container_with_author() {
        let dir = tempfile::tempdir().unwrap();
        let report = interactor(SYSTEM)
            .attenuator(AttenuatorRequest {
                calibration: Some(calibration_file(&dir)),
                fit: Some(FitKind::Poly),
                order: Some(1),
                container: Some(dir.path().join("attenuator")),
                user: Some("jd".to_string()),
                ..AttenuatorRequest::default()
            })
            .await
            .unwrap();
        let path = report.container.unwrap();
        assert_eq!(path, dir.path().join("attenuator.zdc"));

        let container = DataContainer::read(&path).unwrap();
        container
            .validate_type(ATTENUATOR_CONTAINER_TYPE, 1.1)
            .unwrap();
        assert_eq!(container.json("meta.json").unwrap()["email"], "jd@example.org");
        assert_eq!(container.json("data/attenuator.json").unwrap()["fitKind"], "poly");
    }

    #[tokio::test]
    async fn test_attenuator_without_configured_file() {
        let result = interactor(SYSTEM)
            .attenuator(AttenuatorRequest::default())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_plane_fit_from_csv() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("points.csv");
        std::fs::write(
            &csv_path,
            "x, y, z\n# corner points\n0, 0, 1.0\n10, 0, 1.1\n0, 10, 0.9\n10, 10, 1.0\n",
        )
        .unwrap();

        let report = interactor(SYSTEM)
            .plane_fit(PlaneFitRequest {
                points: csv_path,
                container: Some(dir.path().join("plane.zdc")),
                user: None,
            })
            .await
            .unwrap();
        assert!((report.plane.x_slope - 0.01).abs() < 1e-9);
        assert!((report.plane.y_slope + 0.01).abs() < 1e-9);
        assert!((report.plane.z0 - 1.0).abs() < 1e-9);
        assert_eq!(report.plane.points.len(), 4);

        let container = DataContainer::read(&report.container.unwrap()).unwrap();
        container
            .validate_type(PLANE_CONTAINER_TYPE, PLANE_CONTAINER_VERSION)
            .unwrap();
        assert_eq!(
            container.json("meas/points.json").unwrap()["points"]
                .as_array()
                .unwrap()
                .len(),
            4
        );
    }

    #[tokio::test]
    async fn test_plane_fit_rejects_bad_rows() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("points.csv");
        std::fs::write(&csv_path, "x,y,z\n0,0,abc\n").unwrap();
        let result = interactor(SYSTEM)
            .plane_fit(PlaneFitRequest {
                points: csv_path,
                ..PlaneFitRequest::default()
            })
            .await;
        assert!(matches!(result, Err(NanoFactoryError::InvalidPoints { .. })));
    }

    #[tokio::test]
    async fn test_plane_scan_on_grid() {
        let dir = tempfile::tempdir().unwrap();
        let report = interactor(SYSTEM)
            .plane_scan(PlaneScanRequest {
                x0: 0.0,
                y0: 0.0,
                dx: 10000.0,
                dy: 1000.0,
                nx: 3,
                ny: 2,
                z_lower: 1000.0,
                z_upper: 1050.0,
                container: Some(dir.path().join("scan.zdc")),
                user: Some("jd".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(report.steps, 6);
        assert!((report.results.upper.z0 - 1050.0).abs() < 1e-6);
        assert!((report.results.lower.x_slope - 0.001).abs() < 1e-6);
        assert!(report.container.unwrap().exists());
    }

    #[test]
    fn test_system_value() {
        let interactor = interactor(SYSTEM);
        assert_eq!(interactor.system_value("site").unwrap(), "lab");
        assert!(interactor.system_value("attenuator").is_err());
    }
}
