use nalgebra::{Matrix3x2, Rotation3, Unit, Vector2, Vector3};

/// A unit bearing with a 2-parameter local chart.
///
/// This is all the projection layer needs from the estimator's bearing type;
/// any type implementing it can be passed to [`Camera::normal_to_pixel`] and
/// friends.
///
/// [`Camera::normal_to_pixel`]: super::Camera::normal_to_pixel
pub trait BearingManifold: Sized {
    /// The bearing as an ambient 3-vector
    fn vector(&self) -> Vector3<f64>;

    /// 3x2 basis mapping a local perturbation to an ambient tangent direction
    fn tangent_basis(&self) -> Matrix3x2<f64>;

    /// Construct by normalizing an arbitrary non-zero 3-vector
    fn from_vector(v: &Vector3<f64>) -> Self;
}

/// Unit-sphere point with an orthonormal tangent basis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitBearing(Unit<Vector3<f64>>);

impl UnitBearing {
    /// Normalize `v`, which must be non-zero; a zero vector yields NaN
    /// components. Use [`UnitBearing::try_new`] for unchecked input.
    pub fn new(v: Vector3<f64>) -> Self {
        Self(Unit::new_normalize(v))
    }

    /// Normalize `v`, or `None` when its norm is not above `min_norm`
    pub fn try_new(v: Vector3<f64>, min_norm: f64) -> Option<Self> {
        Unit::try_new(v, min_norm).map(Self)
    }

    pub fn as_unit(&self) -> &Unit<Vector3<f64>> {
        &self.0
    }

    /// Rotate by the local perturbation `delta`.
    ///
    /// The rotation vector is `v x (M delta)`, so the derivative at zero is
    /// exactly the tangent basis `M`.
    pub fn box_plus(&self, delta: &Vector2<f64>) -> Self {
        let tangent = self.tangent_basis() * delta;
        let rotation = Rotation3::new(self.0.cross(&tangent));
        Self(Unit::new_normalize(rotation * self.0.into_inner()))
    }

    /// Angle between two bearings in radians
    pub fn angle_to(&self, other: &Self) -> f64 {
        let cross = self.0.cross(&other.0).norm();
        let dot = self.0.dot(&other.0);
        cross.atan2(dot)
    }
}

impl BearingManifold for UnitBearing {
    fn vector(&self) -> Vector3<f64> {
        self.0.into_inner()
    }

    fn tangent_basis(&self) -> Matrix3x2<f64> {
        let v = self.0.as_ref();
        // Helper axis least aligned with v
        let axis = if v.x.abs() <= v.y.abs() && v.x.abs() <= v.z.abs() {
            Vector3::x()
        } else if v.y.abs() <= v.z.abs() {
            Vector3::y()
        } else {
            Vector3::z()
        };
        let m1 = v.cross(&axis).normalize();
        let m2 = v.cross(&m1);
        Matrix3x2::from_columns(&[m1, m2])
    }

    fn from_vector(v: &Vector3<f64>) -> Self {
        Self::new(*v)
    }
}
