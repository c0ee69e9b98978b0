use nalgebra::{Vector2, Vector3};
use tracing::{debug, trace};

use super::Result;
use super::distortion::undistort_equidistant;
use super::manifold::BearingManifold;
use super::params::{Camera, DistortionModel};
use crate::error::ProjectionError;

/// Gauss-Newton iteration limit of the iterative inverse
pub const MAX_ITERATIONS: usize = 100;

/// Squared residual (normalized plane units) accepted as converged
pub const TOLERANCE: f64 = 1e-10;

fn finite_bearing(plane: &Vector2<f64>) -> Result<Vector3<f64>> {
    let bearing = Vector3::new(plane.x, plane.y, 1.0).normalize();
    if bearing.iter().all(|v| v.is_finite()) {
        Ok(bearing)
    } else {
        Err(ProjectionError::NonFinite("bearing"))
    }
}

impl Camera {
    fn check_valid_radius(&self, undistorted: &Vector2<f64>) -> Result<()> {
        let radius = undistorted.norm();
        if radius > self.valid_radius() {
            return Err(ProjectionError::OutsideValidRadius {
                radius,
                limit: self.valid_radius(),
            });
        }
        Ok(())
    }

    /// Remove distortion from a normalized plane point using Gauss-Newton.
    ///
    /// Seeded with the distorted point itself. A failure of the seed is
    /// returned as is; an iterate that later leaves the model's domain counts
    /// as non-convergence.
    pub fn undistort(&self, distorted: &Vector2<f64>) -> Result<Vector2<f64>> {
        if !(distorted.x.is_finite() && distorted.y.is_finite()) {
            return Err(ProjectionError::NonFinite("plane point"));
        }

        let mut guess = *distorted;
        let mut residual_sq = f64::INFINITY;
        let mut iterations = 0;

        while iterations < MAX_ITERATIONS {
            let first = iterations == 0;
            iterations += 1;

            let (estimate, j) = match self.distort_with_jacobian(&guess) {
                Ok(value) => value,
                Err(err) if first => return Err(err),
                Err(_) => break,
            };

            let residual = distorted - estimate;
            residual_sq = residual.norm_squared();

            // du = (J^T J)^-1 J^T e
            let jt = j.transpose();
            let Some(normal_inv) = (jt * j).try_inverse() else {
                if first {
                    return Err(ProjectionError::SingularJacobian);
                }
                break;
            };
            guess += normal_inv * jt * residual;

            if !(guess.x.is_finite() && guess.y.is_finite()) {
                break;
            }

            if residual_sq <= TOLERANCE {
                trace!(iterations, residual_sq, "undistortion converged");
                self.check_valid_radius(&guess)?;
                return Ok(guess);
            }
        }

        debug!(
            iterations,
            residual_sq,
            x = distorted.x,
            y = distorted.y,
            model = %self.model(),
            "undistortion failed to converge"
        );
        Err(ProjectionError::NoConvergence(iterations))
    }

    /// Recover a unit bearing from a pixel by iterative undistortion.
    ///
    /// Works for every model; fails with [`ProjectionError::NoConvergence`]
    /// when the iteration limit is reached.
    pub fn pixel_to_bearing_iterative(&self, pixel: &Vector2<f64>) -> Result<Vector3<f64>> {
        let distorted = self.pixel_to_plane(pixel);
        let undistorted = self.undistort(&distorted)?;
        finite_bearing(&undistorted)
    }

    /// Recover a unit bearing from a pixel in closed form.
    ///
    /// Only defined for the refractive models: undoes the equidistant stage
    /// first when present, then inverts flat-port refraction with
    /// `m = sqrt(n^2 r^2 + n^2 - r^2)`.
    pub fn pixel_to_bearing_analytical(
        &self,
        pixel: &Vector2<f64>,
        index: Option<f64>,
    ) -> Result<Vector3<f64>> {
        let n = self.resolve_index(index);
        let mut plane = self.pixel_to_plane(pixel);
        if !(plane.x.is_finite() && plane.y.is_finite()) {
            return Err(ProjectionError::NonFinite("plane point"));
        }

        match self.model() {
            DistortionModel::Refractive => {}
            DistortionModel::EquiRefractive => {
                plane = undistort_equidistant(self.coefficients(), &plane)?;
            }
            other => return Err(ProjectionError::UnsupportedModel(other)),
        }

        let r2 = plane.norm_squared();
        let m2 = n * n * r2 + n * n - r2;
        if !(m2 > 0.0) {
            return Err(ProjectionError::RefractionDomain(m2));
        }

        let undistorted = plane / m2.sqrt();
        self.check_valid_radius(&undistorted)?;
        finite_bearing(&undistorted)
    }

    /// Recover a unit bearing from a pixel: closed form for the refractive
    /// models, Gauss-Newton otherwise
    pub fn pixel_to_bearing(&self, pixel: &Vector2<f64>) -> Result<Vector3<f64>> {
        if self.model().is_refractive() {
            self.pixel_to_bearing_analytical(pixel, None)
        } else {
            self.pixel_to_bearing_iterative(pixel)
        }
    }

    /// Recover a bearing manifold point from a pixel
    pub fn pixel_to_normal<N: BearingManifold>(&self, pixel: &Vector2<f64>) -> Result<N> {
        self.pixel_to_bearing(pixel).map(|v| N::from_vector(&v))
    }
}
