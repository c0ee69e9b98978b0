use std::fmt;
use std::str::FromStr;

use nalgebra::{Matrix2, Matrix3, Vector2};

use crate::error::ParameterError;

/// Lens/medium distortion model. Exactly one is active per camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DistortionModel {
    /// Radial-tangential (plumb bob)
    #[default]
    RadTan,
    /// Kannala-Brandt equidistant fisheye
    Equidistant,
    /// Double sphere, `xi` in `k1` and `alpha` in `k2`
    DoubleSphere,
    /// Refraction at a flat port
    Refractive,
    /// Flat-port refraction followed by the equidistant fisheye
    EquiRefractive,
}

impl DistortionModel {
    /// Name used in calibration files
    pub fn as_str(&self) -> &'static str {
        match self {
            DistortionModel::RadTan => "plumb_bob",
            DistortionModel::Equidistant => "equidistant",
            DistortionModel::DoubleSphere => "ds",
            DistortionModel::Refractive => "refractive",
            DistortionModel::EquiRefractive => "equirefractive",
        }
    }

    /// Whether the model depends on the refractive index
    pub fn is_refractive(&self) -> bool {
        matches!(
            self,
            DistortionModel::Refractive | DistortionModel::EquiRefractive
        )
    }
}

impl fmt::Display for DistortionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistortionModel {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plumb_bob" | "radtan" => Ok(DistortionModel::RadTan),
            "equidistant" => Ok(DistortionModel::Equidistant),
            "ds" | "double_sphere" => Ok(DistortionModel::DoubleSphere),
            "refractive" => Ok(DistortionModel::Refractive),
            "equirefractive" => Ok(DistortionModel::EquiRefractive),
            other => Err(ParameterError::UnknownModel(other.to_string())),
        }
    }
}

/// Distortion coefficients, used selectively per model
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DistortionCoeffs {
    // Radial
    pub k1: f64,
    pub k2: f64,
    pub k3: f64,
    pub k4: f64,
    pub k5: f64,
    pub k6: f64,

    // Tangential
    pub p1: f64,
    pub p2: f64,

    // Reserved (thin prism)
    pub s1: f64,
    pub s2: f64,
    pub s3: f64,
    pub s4: f64,
}

impl DistortionCoeffs {
    fn all(&self) -> [f64; 12] {
        [
            self.k1, self.k2, self.k3, self.k4, self.k5, self.k6, self.p1, self.p2, self.s1,
            self.s2, self.s3, self.s4,
        ]
    }
}

/// Camera parameter set: intrinsics, active distortion model and its coefficients.
///
/// Built once (by hand or by a calibration loader) and read-only afterwards;
/// every projection method takes `&self`, so one instance can be shared
/// across threads.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    intrinsics: Matrix3<f64>,
    model: DistortionModel,
    coeffs: DistortionCoeffs,
    refractive_index: f64,
    valid_radius: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            intrinsics: Matrix3::identity(),
            model: DistortionModel::RadTan,
            coeffs: DistortionCoeffs::default(),
            refractive_index: 1.0,
            valid_radius: f64::INFINITY,
        }
    }
}

impl Camera {
    /// Create an ideal pinhole camera (radtan with zero coefficients)
    pub fn pinhole(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        let mut intrinsics = Matrix3::identity();
        intrinsics[(0, 0)] = fx;
        intrinsics[(1, 1)] = fy;
        intrinsics[(0, 2)] = cx;
        intrinsics[(1, 2)] = cy;
        Self::default().with_intrinsics(intrinsics)
    }

    /// Create a camera with radial-tangential distortion
    pub fn new_radtan(
        fx: f64,
        fy: f64,
        cx: f64,
        cy: f64,
        k1: f64,
        k2: f64,
        k3: f64,
        p1: f64,
        p2: f64,
    ) -> Self {
        Self::pinhole(fx, fy, cx, cy).with_coefficients(DistortionCoeffs {
            k1,
            k2,
            k3,
            p1,
            p2,
            ..Default::default()
        })
    }

    /// Create an equidistant fisheye camera
    pub fn new_equidistant(
        fx: f64,
        fy: f64,
        cx: f64,
        cy: f64,
        k1: f64,
        k2: f64,
        k3: f64,
        k4: f64,
    ) -> Self {
        Self::pinhole(fx, fy, cx, cy)
            .with_model(DistortionModel::Equidistant)
            .with_coefficients(DistortionCoeffs {
                k1,
                k2,
                k3,
                k4,
                ..Default::default()
            })
    }

    /// Create a double sphere camera
    pub fn new_double_sphere(fx: f64, fy: f64, cx: f64, cy: f64, xi: f64, alpha: f64) -> Self {
        Self::pinhole(fx, fy, cx, cy)
            .with_model(DistortionModel::DoubleSphere)
            .with_coefficients(DistortionCoeffs {
                k1: xi,
                k2: alpha,
                ..Default::default()
            })
    }

    /// Create a flat-port refractive camera
    pub fn new_refractive(fx: f64, fy: f64, cx: f64, cy: f64, refractive_index: f64) -> Self {
        Self::pinhole(fx, fy, cx, cy)
            .with_model(DistortionModel::Refractive)
            .with_refractive_index(refractive_index)
    }

    /// Create a flat-port refractive camera behind an equidistant fisheye lens
    pub fn new_equirefractive(
        fx: f64,
        fy: f64,
        cx: f64,
        cy: f64,
        k1: f64,
        k2: f64,
        k3: f64,
        k4: f64,
        refractive_index: f64,
    ) -> Self {
        Self::new_equidistant(fx, fy, cx, cy, k1, k2, k3, k4)
            .with_model(DistortionModel::EquiRefractive)
            .with_refractive_index(refractive_index)
    }

    pub fn with_intrinsics(mut self, intrinsics: Matrix3<f64>) -> Self {
        self.intrinsics = intrinsics;
        self
    }

    pub fn with_model(mut self, model: DistortionModel) -> Self {
        self.model = model;
        self
    }

    pub fn with_coefficients(mut self, coeffs: DistortionCoeffs) -> Self {
        self.coeffs = coeffs;
        self
    }

    pub fn with_refractive_index(mut self, refractive_index: f64) -> Self {
        self.refractive_index = refractive_index;
        self
    }

    /// Limit the undistorted normalized-plane radius, `sqrt(x^2 + y^2)` at
    /// `z = 1`. The unit is the normalized plane, not pixels or a ratio of
    /// the image size.
    pub fn with_valid_radius(mut self, valid_radius: f64) -> Self {
        self.valid_radius = valid_radius;
        self
    }

    /// Check the invariants every projection method relies on
    pub fn validate(&self) -> Result<(), ParameterError> {
        if self.intrinsics.iter().any(|v| !v.is_finite()) {
            return Err(ParameterError::NonFinite("camera matrix"));
        }
        if self.coeffs.all().iter().any(|v| !v.is_finite()) {
            return Err(ParameterError::NonFinite("distortion coefficients"));
        }

        let (fx, fy) = self.focal_length();
        if fx == 0.0 || fy == 0.0 {
            return Err(ParameterError::InvalidFocalLength { fx, fy });
        }

        let n = self.refractive_index;
        if !n.is_finite() || n < 1.0 {
            return Err(ParameterError::InvalidRefractiveIndex(n));
        }

        // +inf is the unbounded default
        if self.valid_radius.is_nan() || self.valid_radius <= 0.0 {
            return Err(ParameterError::InvalidValidRadius(self.valid_radius));
        }

        Ok(())
    }

    pub fn intrinsics(&self) -> &Matrix3<f64> {
        &self.intrinsics
    }

    pub fn model(&self) -> DistortionModel {
        self.model
    }

    pub fn coefficients(&self) -> &DistortionCoeffs {
        &self.coeffs
    }

    pub fn refractive_index(&self) -> f64 {
        self.refractive_index
    }

    /// Valid radius on the undistorted normalized plane
    pub fn valid_radius(&self) -> f64 {
        self.valid_radius
    }

    /// Get focal lengths
    pub fn focal_length(&self) -> (f64, f64) {
        (self.intrinsics[(0, 0)], self.intrinsics[(1, 1)])
    }

    /// Get principal point
    pub fn principal_point(&self) -> (f64, f64) {
        (self.intrinsics[(0, 2)], self.intrinsics[(1, 2)])
    }

    /// Distorted normalized plane to pixel
    pub fn plane_to_pixel(&self, distorted: &Vector2<f64>) -> Vector2<f64> {
        let (fx, fy) = self.focal_length();
        let (cx, cy) = self.principal_point();
        Vector2::new(fx * distorted.x + cx, fy * distorted.y + cy)
    }

    /// Pixel to distorted normalized plane
    pub fn pixel_to_plane(&self, pixel: &Vector2<f64>) -> Vector2<f64> {
        let (fx, fy) = self.focal_length();
        let (cx, cy) = self.principal_point();
        Vector2::new((pixel.x - cx) / fx, (pixel.y - cy) / fy)
    }

    /// Derivative of the pixel w.r.t. the distorted plane point, `diag(fx, fy)`
    pub fn intrinsics_jacobian(&self) -> Matrix2<f64> {
        let (fx, fy) = self.focal_length();
        Matrix2::new(fx, 0.0, 0.0, fy)
    }

    pub(super) fn resolve_index(&self, index: Option<f64>) -> f64 {
        index.unwrap_or(self.refractive_index)
    }
}
