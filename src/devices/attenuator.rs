//! Laser power attenuator calibration
//!
//! The calibration file is a flat sequence of little-endian `f64` pairs
//! `(attenuator value, laser power in mW)`. Conversion in both directions uses
//! a linear or natural cubic spline interpolation, or a least squares
//! polynomial.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::container::{ContainerMeta, DataContainer};
use crate::domain::errors::DomainError;
use crate::settings::ParameterSet;
use crate::tools::linalg::least_squares;

pub const ATTENUATOR_CONTAINER_TYPE: &str = "PowerAttenuator";
pub const ATTENUATOR_CONTAINER_VERSION: f64 = 1.1;

const RECORD_SIZE: usize = 16;
const DEFAULT_POLYNOMIAL_ORDER: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitKind {
    Linear,
    Cubic,
    Poly,
}

impl FromStr for FitKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linear" => Ok(FitKind::Linear),
            "cubic" => Ok(FitKind::Cubic),
            "poly" => Ok(FitKind::Poly),
            _ => Err(DomainError::Calibration(format!("Unknown fit kind '{}'", s))),
        }
    }
}

/// One direction of the calibration
#[derive(Debug, Clone, PartialEq)]
enum Curve {
    Linear { x: Vec<f64>, y: Vec<f64> },
    /// Knots plus second derivatives
    Spline { x: Vec<f64>, y: Vec<f64>, m: Vec<f64> },
    /// Coefficients, lowest order first
    Poly { coeffs: Vec<f64> },
}

fn sorted_knots(x: &[f64], y: &[f64]) -> Result<(Vec<f64>, Vec<f64>), DomainError> {
    let mut pairs: Vec<(f64, f64)> = x.iter().copied().zip(y.iter().copied()).collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
    if pairs.len() < 2 {
        return Err(DomainError::Calibration(
            "Interpolation needs at least 2 points".to_string(),
        ));
    }
    if pairs.windows(2).any(|w| w[0].0 == w[1].0) {
        return Err(DomainError::Calibration(
            "Interpolation points must be distinct".to_string(),
        ));
    }
    Ok(pairs.into_iter().unzip())
}

/// Second derivatives of the natural cubic spline (tridiagonal solve)
fn spline_moments(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len();
    let mut m = vec![0.0; n];
    if n < 3 {
        return m;
    }
    let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();

    // forward sweep over the inner knots
    let mut diag = vec![0.0; n];
    let mut rhs = vec![0.0; n];
    for i in 1..n - 1 {
        diag[i] = 2.0 * (h[i - 1] + h[i]);
        rhs[i] = 6.0 * ((y[i + 1] - y[i]) / h[i] - (y[i] - y[i - 1]) / h[i - 1]);
        if i > 1 {
            let factor = h[i - 1] / diag[i - 1];
            diag[i] -= factor * h[i - 1];
            rhs[i] -= factor * rhs[i - 1];
        }
    }
    for i in (1..n - 1).rev() {
        m[i] = (rhs[i] - h[i] * m[i + 1]) / diag[i];
    }
    m
}

impl Curve {
    fn interpolating(kind: FitKind, x: &[f64], y: &[f64]) -> Result<Self, DomainError> {
        let (x, y) = sorted_knots(x, y)?;
        Ok(match kind {
            FitKind::Linear => Curve::Linear { x, y },
            _ => {
                let m = spline_moments(&x, &y);
                Curve::Spline { x, y, m }
            }
        })
    }

    fn polynomial(x: &[f64], y: &[f64], order: usize) -> Result<Self, DomainError> {
        let rows: Vec<Vec<f64>> = x
            .iter()
            .map(|&v| (0..=order).map(|k| v.powi(k as i32)).collect())
            .collect();
        let coeffs = least_squares(&rows, y).map_err(|e| {
            DomainError::Calibration(format!("Polynomial fit of order {} failed: {}", order, e))
        })?;
        Ok(Curve::Poly { coeffs })
    }

    fn segment(x: &[f64], t: f64) -> Result<usize, DomainError> {
        let (first, last) = (x[0], x[x.len() - 1]);
        if !(first..=last).contains(&t) {
            return Err(DomainError::BadArgs(format!(
                "{} is outside the interpolation range [{}, {}]",
                t, first, last
            )));
        }
        let upper = x.partition_point(|&v| v <= t);
        Ok(upper.saturating_sub(1).min(x.len() - 2))
    }

    fn eval(&self, t: f64) -> Result<f64, DomainError> {
        match self {
            Curve::Linear { x, y } => {
                let i = Self::segment(x, t)?;
                let s = (t - x[i]) / (x[i + 1] - x[i]);
                Ok(y[i] + s * (y[i + 1] - y[i]))
            }
            Curve::Spline { x, y, m } => {
                let i = Self::segment(x, t)?;
                let h = x[i + 1] - x[i];
                let (a, b) = (x[i + 1] - t, t - x[i]);
                Ok(m[i] * a.powi(3) / (6.0 * h)
                    + m[i + 1] * b.powi(3) / (6.0 * h)
                    + (y[i] / h - m[i] * h / 6.0) * a
                    + (y[i + 1] / h - m[i + 1] * h / 6.0) * b)
            }
            Curve::Poly { coeffs } => Ok(coeffs.iter().rev().fold(0.0, |acc, c| acc * t + c)),
        }
    }
}

fn attenuator_defaults() -> Map<String, Value> {
    match json!({
        "calibrationFile": "",
        "fitKind": "cubic",
        "polynomialOrder": null,
        "valueMin": 0.0,
        "valueMax": 10.0,
        "powerMin": null,
        "powerMax": null,
    }) {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Attenuator value ↔ laser power conversion
#[derive(Debug, Clone)]
pub struct Attenuator {
    params: ParameterSet,
    raw: Vec<u8>,
    data: Vec<[f64; 2]>,
    to_power: Curve,
    to_value: Curve,
}

impl Attenuator {
    /// Load the calibration file named by `calibrationFile`
    pub fn open(overrides: Map<String, Value>) -> Result<Self, DomainError> {
        let params = ParameterSet::new(attenuator_defaults(), overrides.clone())?;
        let path = params.str("calibrationFile")?.to_string();
        if path.is_empty() {
            return Err(DomainError::Config(
                "No attenuator calibration file configured".to_string(),
            ));
        }
        Self::load(Path::new(&path), overrides)
    }

    pub fn load(path: &Path, mut overrides: Map<String, Value>) -> Result<Self, DomainError> {
        let raw = std::fs::read(path).map_err(|e| {
            DomainError::FsFail(format!(
                "Cannot read calibration file {}: {}",
                path.display(),
                e
            ))
        })?;
        overrides.insert(
            "calibrationFile".to_string(),
            Value::String(path.display().to_string()),
        );
        Self::from_bytes(raw, overrides)
    }

    pub fn from_bytes(raw: Vec<u8>, overrides: Map<String, Value>) -> Result<Self, DomainError> {
        let mut params = ParameterSet::new(attenuator_defaults(), overrides)?;
        info!("Initializing attenuator.");

        if raw.len() % RECORD_SIZE != 0 {
            return Err(DomainError::Calibration(
                "File size must be a multiple of 16!".to_string(),
            ));
        }
        let data: Vec<[f64; 2]> = raw
            .chunks_exact(RECORD_SIZE)
            .map(|record| {
                let mut value = [0u8; 8];
                let mut power = [0u8; 8];
                value.copy_from_slice(&record[..8]);
                power.copy_from_slice(&record[8..]);
                [f64::from_le_bytes(value), f64::from_le_bytes(power)]
            })
            .collect();
        let values: Vec<f64> = data.iter().map(|d| d[0]).collect();
        let powers: Vec<f64> = data.iter().map(|d| d[1]).collect();

        let kind: FitKind = params.str("fitKind")?.parse()?;
        let (to_power, to_value) = match kind {
            FitKind::Poly => {
                let order = params
                    .get("polynomialOrder")?
                    .as_u64()
                    .map(|o| o as usize)
                    .unwrap_or(DEFAULT_POLYNOMIAL_ORDER);
                params.set("polynomialOrder", json!(order))?;
                (
                    Curve::polynomial(&values, &powers, order)?,
                    Curve::polynomial(&powers, &values, order)?,
                )
            }
            _ => (
                Curve::interpolating(kind, &values, &powers)?,
                Curve::interpolating(kind, &powers, &values)?,
            ),
        };

        let fold = |v: &[f64], init: f64, f: fn(f64, f64) -> f64| v.iter().copied().fold(init, f);
        let value_min = params.f64("valueMin")?;
        let value_max = params.f64("valueMax")?;
        if fold(&values, f64::INFINITY, f64::min) != value_min {
            return Err(DomainError::Calibration(format!(
                "Attenuator data must start at {:.1}!",
                value_min
            )));
        }
        if fold(&values, f64::NEG_INFINITY, f64::max) != value_max {
            return Err(DomainError::Calibration(format!(
                "Attenuator data must end at {:.1}!",
                value_max
            )));
        }
        params.set("powerMin", json!(fold(&powers, f64::INFINITY, f64::min)))?;
        params.set("powerMax", json!(fold(&powers, f64::NEG_INFINITY, f64::max)))?;

        let attenuator = Self {
            params,
            raw,
            data,
            to_power,
            to_value,
        };
        info!("{}", attenuator);
        info!("Initialized attenuator.");
        Ok(attenuator)
    }

    pub fn steps(&self) -> usize {
        self.data.len()
    }

    /// Calibration pairs (value, power in mW)
    pub fn data(&self) -> &[[f64; 2]] {
        &self.data
    }

    pub fn parameters(&self) -> Map<String, Value> {
        self.params.parameters()
    }

    pub fn power_range(&self) -> Result<(f64, f64), DomainError> {
        Ok((self.params.f64("powerMin")?, self.params.f64("powerMax")?))
    }

    /// Laser power in mW for an attenuator value
    pub fn value_to_power(&self, value: f64) -> Result<f64, DomainError> {
        self.to_power.eval(value)
    }

    /// Attenuator value for a laser power in mW
    pub fn power_to_value(&self, power: f64) -> Result<f64, DomainError> {
        self.to_value.eval(power)
    }

    /// Parameters plus the calibration table
    pub fn info(&self) -> Map<String, Value> {
        let mut info = self.parameters();
        info.insert("calibration".to_string(), json!(self.data));
        info
    }

    pub fn container(
        &self,
        author: Option<String>,
        email: Option<String>,
    ) -> Result<DataContainer, DomainError> {
        let meta = ContainerMeta::new(
            "Laser power calibration data",
            "Calibration data for laser attenuator.",
        )
        .with_author(author, email);
        let mut container = DataContainer::new(
            ATTENUATOR_CONTAINER_TYPE,
            ATTENUATOR_CONTAINER_VERSION,
            meta,
        )?;
        container.insert_json("data/attenuator.json", &self.parameters())?;
        container.insert_json("meas/calibration.json", &json!({ "calibration": self.data }))?;
        container.insert_bytes("meas/calibration.dat", self.raw.clone());
        Ok(container)
    }
}

impl fmt::Display for Attenuator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (low, high) = self.power_range().unwrap_or((f64::NAN, f64::NAN));
        write!(
            f,
            "Attenuator: {:.2} - {:.2} mW ({} steps).",
            low,
            high,
            self.steps()
        )
    }
}

/// Encode calibration pairs in the file format
pub fn encode_calibration(pairs: &[[f64; 2]]) -> Vec<u8> {
    pairs
        .iter()
        .flat_map(|[value, power]| {
            value
                .to_le_bytes()
                .into_iter()
                .chain(power.to_le_bytes())
        })
        .collect()
}
