use nalgebra::{Matrix2, Matrix2x3, Vector2, Vector3};

use super::Result;
use super::manifold::BearingManifold;
use super::params::Camera;
use crate::error::ProjectionError;

/// Pixel and its derivatives w.r.t. an ambient 3D bearing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelJacobians {
    pub pixel: Vector2<f64>,
    /// d(pixel)/d(bearing)
    pub d_bearing: Matrix2x3<f64>,
    /// d(pixel)/d(refractive index); zero for models that do not refract
    pub d_index: Vector2<f64>,
}

/// Pixel and its derivatives w.r.t. a bearing's 2-parameter local chart
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalJacobians {
    pub pixel: Vector2<f64>,
    /// d(pixel)/d(local perturbation)
    pub d_normal: Matrix2<f64>,
    /// d(pixel)/d(refractive index); zero for models that do not refract
    pub d_index: Vector2<f64>,
}

/// Derivative of `(x/z, y/z)` w.r.t. `(x, y, z)`
fn project_jacobian(bearing: &Vector3<f64>) -> Matrix2x3<f64> {
    let inv_z = 1.0 / bearing.z;
    let inv_z2 = inv_z * inv_z;
    Matrix2x3::new(
        inv_z,
        0.0,
        -bearing.x * inv_z2,
        0.0,
        inv_z,
        -bearing.y * inv_z2,
    )
}

impl Camera {
    /// Project onto the normalized plane, rejecting points behind the camera
    /// and radii beyond the valid radius
    fn project_to_plane(&self, bearing: &Vector3<f64>) -> Result<Vector2<f64>> {
        if bearing.iter().any(|v| !v.is_finite()) {
            return Err(ProjectionError::NonFinite("bearing"));
        }
        if bearing.z <= 0.0 {
            return Err(ProjectionError::BehindCamera);
        }

        let undistorted = Vector2::new(bearing.x / bearing.z, bearing.y / bearing.z);

        let radius = undistorted.norm();
        if radius > self.valid_radius() {
            return Err(ProjectionError::OutsideValidRadius {
                radius,
                limit: self.valid_radius(),
            });
        }

        Ok(undistorted)
    }

    /// Project a bearing in camera coordinates to pixel coordinates.
    ///
    /// `index` overrides the stored refractive index for refractive models.
    pub fn bearing_to_pixel(
        &self,
        bearing: &Vector3<f64>,
        index: Option<f64>,
    ) -> Result<Vector2<f64>> {
        let undistorted = self.project_to_plane(bearing)?;
        let distorted = self.distort_with_index(&undistorted, self.resolve_index(index))?;
        Ok(self.plane_to_pixel(&distorted))
    }

    /// Project a bearing and compute d(pixel)/d(bearing) and d(pixel)/dn
    pub fn bearing_to_pixel_with_jacobian(
        &self,
        bearing: &Vector3<f64>,
        index: Option<f64>,
    ) -> Result<PixelJacobians> {
        let undistorted = self.project_to_plane(bearing)?;
        let (distorted, j_distort, dn) = self.evaluate(&undistorted, self.resolve_index(index))?;

        let j_intrinsics = self.intrinsics_jacobian();
        Ok(PixelJacobians {
            pixel: self.plane_to_pixel(&distorted),
            d_bearing: j_intrinsics * j_distort * project_jacobian(bearing),
            d_index: j_intrinsics * dn,
        })
    }

    /// Project a bearing manifold point
    pub fn normal_to_pixel<N: BearingManifold>(
        &self,
        normal: &N,
        index: Option<f64>,
    ) -> Result<Vector2<f64>> {
        self.bearing_to_pixel(&normal.vector(), index)
    }

    /// Project a bearing manifold point and compute the 2x2 Jacobian in its
    /// local chart
    pub fn normal_to_pixel_with_jacobian<N: BearingManifold>(
        &self,
        normal: &N,
        index: Option<f64>,
    ) -> Result<NormalJacobians> {
        let jacobians = self.bearing_to_pixel_with_jacobian(&normal.vector(), index)?;
        Ok(NormalJacobians {
            pixel: jacobians.pixel,
            d_normal: jacobians.d_bearing * normal.tangent_basis(),
            d_index: jacobians.d_index,
        })
    }
}
