//! Round volumes built from stacked circular layers: lenses and cylinders

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{slice_count, CircleFill, Drawable, DrawableProgram};
use crate::domain::coordinate_system::CoordinateSystem;
use crate::domain::errors::DomainError;
use crate::domain::geometry::{Point3D, EPS};

/// Layer at height `z` above `center`
fn draw_layer(
    program: &mut DrawableProgram,
    fill: &CircleFill,
    center: Point3D,
    index: usize,
    z: f64,
    radius: f64,
    velocity: Option<f64>,
) -> Result<(), DomainError> {
    match fill.layer(center + Point3D::new(0.0, 0.0, z), radius, velocity) {
        Some(layer) => {
            program.comment(&format!("\nLayer {}: z={:.4}, r={:.4}", index, z, radius));
            let coordinate_system = *program.coordinate_system();
            program.append(layer.draw_on(&coordinate_system)?);
        }
        None => debug!(index, z, "Skipping layer without area"),
    }
    Ok(())
}

/// Plano-convex spherical cap standing on the substrate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SphericalLens {
    pub center: Point3D,
    pub max_height: f64,
    pub radius_of_curvature: f64,
    pub layer_height: f64,
    #[serde(default)]
    pub fill: CircleFill,
    #[serde(default)]
    pub velocity: Option<f64>,
}

impl SphericalLens {
    /// Distance of the sphere centre below the substrate
    pub fn offset(&self) -> f64 {
        self.radius_of_curvature - self.max_height
    }

    /// (z, radius) of every slice from the bottom up, the top slice has radius 0
    pub fn layers(&self) -> Result<Vec<(f64, f64)>, DomainError> {
        let r = self.radius_of_curvature;
        let offset = self.offset();
        if offset >= r {
            return Err(DomainError::Geometry(format!(
                "Lens is not printable. Height of offset ({}) exceeds the radius of curvature ({})",
                offset, r
            )));
        }
        let n = slice_count(self.max_height, self.layer_height, "Layer height")?.max(1);
        let slicing_height = self.max_height / n as f64;

        Ok((0..=n)
            .map(|i| {
                let z = i as f64 * slicing_height;
                let height = z + offset;
                let radius = if height <= r {
                    (r * r - height * height).max(0.0).sqrt()
                } else {
                    0.0
                };
                (z, radius)
            })
            .collect())
    }
}

impl Drawable for SphericalLens {
    fn center_point(&self) -> Point3D {
        self.center
    }

    fn draw_on(&self, coordinate_system: &CoordinateSystem) -> Result<DrawableProgram, DomainError> {
        let mut program = DrawableProgram::new(*coordinate_system);
        for (i, (z, radius)) in self.layers()?.into_iter().enumerate() {
            draw_layer(
                &mut program,
                &self.fill,
                self.center,
                i,
                z,
                radius,
                self.velocity,
            )?;
        }
        Ok(program)
    }
}

/// Rotationally symmetric even asphere cut at `aperture_radius`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsphericalLens {
    pub center: Point3D,
    pub radius_of_curvature: f64,
    pub conic_constant: f64,
    #[serde(default)]
    pub alpha: f64,
    pub aperture_radius: f64,
    pub layer_height: f64,
    #[serde(default)]
    pub fill: CircleFill,
    #[serde(default)]
    pub velocity: Option<f64>,
}

impl AsphericalLens {
    /// Surface sag at radial distance `r`
    pub fn sag(&self, r: f64) -> Result<f64, DomainError> {
        let roc = self.radius_of_curvature;
        let root = 1.0 - (1.0 + self.conic_constant) * r * r / (roc * roc);
        if root < 0.0 {
            return Err(DomainError::Geometry(format!(
                "Sag undefined at r={} for R={} and k={}",
                r, roc, self.conic_constant
            )));
        }
        Ok(r * r / (roc * (1.0 + root.sqrt())) + self.alpha * r.powi(4))
    }

    /// Lens height at the optical axis
    pub fn height(&self) -> Result<f64, DomainError> {
        self.sag(self.aperture_radius)
    }

    /// Radius where the surface is `z` above the substrate
    pub fn radius_at(&self, z: f64) -> Result<f64, DomainError> {
        let target = self.height()? - z;
        if target <= 0.0 {
            return Ok(0.0);
        }
        let (mut lo, mut hi) = (0.0, self.aperture_radius);
        if self.sag(hi)? <= target {
            return Ok(hi);
        }
        while hi - lo > EPS {
            let mid = (lo + hi) / 2.0;
            if self.sag(mid)? < target {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        Ok((lo + hi) / 2.0)
    }

    pub fn layers(&self) -> Result<Vec<(f64, f64)>, DomainError> {
        if self.radius_of_curvature <= 0.0 || self.aperture_radius <= 0.0 {
            return Err(DomainError::Geometry(format!(
                "Lens needs positive radius of curvature and aperture (R={}, aperture={})",
                self.radius_of_curvature, self.aperture_radius
            )));
        }
        let height = self.height()?;
        if height <= 0.0 {
            return Err(DomainError::Geometry(format!(
                "Lens has no height (sag at aperture is {})",
                height
            )));
        }
        let n = slice_count(height, self.layer_height, "Layer height")?.max(1);
        let slicing_height = height / n as f64;
        (0..=n)
            .map(|i| {
                let z = i as f64 * slicing_height;
                Ok((z, self.radius_at(z)?))
            })
            .collect()
    }
}

impl Drawable for AsphericalLens {
    fn center_point(&self) -> Point3D {
        self.center
    }

    fn draw_on(&self, coordinate_system: &CoordinateSystem) -> Result<DrawableProgram, DomainError> {
        let mut program = DrawableProgram::new(*coordinate_system);
        for (i, (z, radius)) in self.layers()?.into_iter().enumerate() {
            draw_layer(
                &mut program,
                &self.fill,
                self.center,
                i,
                z,
                radius,
                self.velocity,
            )?;
        }
        Ok(program)
    }
}

/// Upright cylinder of constant radius
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cylinder {
    pub center: Point3D,
    pub radius: f64,
    pub height: f64,
    pub layer_height: f64,
    #[serde(default)]
    pub fill: CircleFill,
    #[serde(default)]
    pub velocity: Option<f64>,
}

impl Drawable for Cylinder {
    fn center_point(&self) -> Point3D {
        self.center
    }

    fn draw_on(&self, coordinate_system: &CoordinateSystem) -> Result<DrawableProgram, DomainError> {
        let n = slice_count(self.height, self.layer_height, "Layer height")?;
        let mut program = DrawableProgram::new(*coordinate_system);
        for i in 0..=n {
            draw_layer(
                &mut program,
                &self.fill,
                self.center,
                i,
                i as f64 * self.layer_height,
                self.radius,
                self.velocity,
            )?;
        }
        Ok(program)
    }
}
