use std::f64::consts::FRAC_PI_2;

use nalgebra::{Matrix2, Vector2};

use super::Result;
use super::params::{Camera, DistortionCoeffs, DistortionModel};
use crate::error::ProjectionError;

// Below these the closed forms divide 0 by 0; the limit is the identity map
const EQUIDISTANT_MIN_RADIUS: f64 = 1e-8;
const DOUBLE_SPHERE_MIN_RADIUS2: f64 = 1e-16;

const EQUIDISTANT_INVERSE_ITERATIONS: usize = 10;

/// Intermediate results of the refractive-then-equidistant composition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquiRefractiveStages {
    /// Final distorted point
    pub point: Vector2<f64>,
    /// Output of the refractive stage, input of the equidistant stage
    pub refracted: Vector2<f64>,
    /// d(point)/d(refracted)
    pub j_equidistant: Matrix2<f64>,
    /// d(refracted)/d(input)
    pub j_refractive: Matrix2<f64>,
}

impl EquiRefractiveStages {
    /// Jacobian of the whole composition
    pub fn jacobian(&self) -> Matrix2<f64> {
        self.j_equidistant * self.j_refractive
    }
}

/// Radial-tangential distortion and its Jacobian
pub fn distort_radtan(c: &DistortionCoeffs, p: &Vector2<f64>) -> (Vector2<f64>, Matrix2<f64>) {
    let (x, y) = (p.x, p.y);
    let x2 = x * x;
    let y2 = y * y;
    let xy = x * y;
    let r2 = x2 + y2;
    let r4 = r2 * r2;

    let kr = 1.0 + ((c.k3 * r2 + c.k2) * r2 + c.k1) * r2;

    let x_dist = x * kr + 2.0 * c.p1 * xy + c.p2 * (r2 + 2.0 * x2);
    let y_dist = y * kr + c.p1 * (r2 + 2.0 * y2) + 2.0 * c.p2 * xy;

    // d(kr)/d(r2), the radial terms pick up 2x or 2y from r2
    let dkr = c.k1 + 2.0 * c.k2 * r2 + 3.0 * c.k3 * r4;

    let j00 = kr + 2.0 * x2 * dkr + 2.0 * c.p1 * y + 6.0 * c.p2 * x;
    let j01 = 2.0 * xy * dkr + 2.0 * c.p1 * x + 2.0 * c.p2 * y;
    let j11 = kr + 2.0 * y2 * dkr + 6.0 * c.p1 * y + 2.0 * c.p2 * x;

    (Vector2::new(x_dist, y_dist), Matrix2::new(j00, j01, j01, j11))
}

/// Equidistant (Kannala-Brandt) distortion and its Jacobian.
///
/// At the principal point the map degenerates to the identity.
pub fn distort_equidistant(
    c: &DistortionCoeffs,
    p: &Vector2<f64>,
) -> (Vector2<f64>, Matrix2<f64>) {
    let r = p.norm();
    if r < EQUIDISTANT_MIN_RADIUS {
        return (*p, Matrix2::identity());
    }

    let theta = r.atan();
    let theta2 = theta * theta;
    let theta4 = theta2 * theta2;
    let theta6 = theta4 * theta2;
    let theta8 = theta4 * theta4;

    let theta_d = theta * (1.0 + c.k1 * theta2 + c.k2 * theta4 + c.k3 * theta6 + c.k4 * theta8);
    let dtheta_d = 1.0
        + 3.0 * c.k1 * theta2
        + 5.0 * c.k2 * theta4
        + 7.0 * c.k3 * theta6
        + 9.0 * c.k4 * theta8;
    let dtheta = 1.0 / (r * r + 1.0);

    let scale = theta_d / r;
    // d(scale)/dr
    let dscale = dtheta_d * dtheta / r - theta_d / (r * r);

    let (rx, ry) = (p.x / r, p.y / r);
    let j = Matrix2::new(
        scale + p.x * dscale * rx,
        p.x * dscale * ry,
        p.y * dscale * rx,
        scale + p.y * dscale * ry,
    );

    (p * scale, j)
}

/// Double sphere distortion (`xi = k1`, `alpha = k2`) and its Jacobian.
///
/// At the principal point the map degenerates to the identity.
pub fn distort_double_sphere(
    c: &DistortionCoeffs,
    p: &Vector2<f64>,
) -> (Vector2<f64>, Matrix2<f64>) {
    let (xi, alpha) = (c.k1, c.k2);
    let r2 = p.norm_squared();
    if r2 < DOUBLE_SPHERE_MIN_RADIUS2 {
        return (*p, Matrix2::identity());
    }

    let d1 = (r2 + 1.0).sqrt();
    let m = xi * d1 + 1.0;
    let d2 = (r2 + m * m).sqrt();
    let scale = 1.0 / (alpha * d2 + (1.0 - alpha) * m);

    let d1_dx = p.x / d1;
    let d1_dy = p.y / d1;
    let d2_dx = (p.x + d1_dx * xi * m) / d2;
    let d2_dy = (p.y + d1_dy * xi * m) / d2;

    // d(scale)/dx = -scale^2 * d(denominator)/dx
    let s2 = scale * scale;
    let ds_dx = -s2 * (alpha * d2_dx + (1.0 - alpha) * xi * d1_dx);
    let ds_dy = -s2 * (alpha * d2_dy + (1.0 - alpha) * xi * d1_dy);

    let j = Matrix2::new(
        scale + p.x * ds_dx,
        p.x * ds_dy,
        p.y * ds_dx,
        scale + p.y * ds_dy,
    );

    (p * scale, j)
}

/// `1 + r^2 - n^2 r^2`, rejected when refraction is undefined
fn refraction_term(n: f64, r2: f64) -> Result<f64> {
    let g = 1.0 + r2 - n * n * r2;
    if g > 0.0 && g.is_finite() {
        Ok(g)
    } else {
        Err(ProjectionError::RefractionDomain(g))
    }
}

/// Flat-port refraction with index `n` and its Jacobian.
///
/// Fails at grazing incidence / total internal reflection, where
/// `1 + r^2 - n^2 r^2 <= 0`.
pub fn distort_refractive(n: f64, p: &Vector2<f64>) -> Result<(Vector2<f64>, Matrix2<f64>)> {
    let g = refraction_term(n, p.norm_squared())?;
    let sqrt_g = g.sqrt();
    let scale = n / sqrt_g;

    // d(scale)/dx = n (n^2 - 1) x / g^(3/2)
    let c = n * (n * n - 1.0) / (g * sqrt_g);
    let j = Matrix2::new(
        scale + c * p.x * p.x,
        c * p.x * p.y,
        c * p.x * p.y,
        scale + c * p.y * p.y,
    );

    Ok((p * scale, j))
}

/// Derivative of the refracted point w.r.t. the refractive index
pub fn refractive_index_derivative(n: f64, p: &Vector2<f64>) -> Result<Vector2<f64>> {
    let r2 = p.norm_squared();
    let g = refraction_term(n, r2)?;
    let dscale_dn = (g + n * n * r2) / (g * g.sqrt());
    Ok(p * dscale_dn)
}

/// Invert the equidistant stage with a bounded Newton solve on `theta`.
///
/// Returns the best estimate after the iteration bound; only a result
/// outside the forward hemisphere is an error.
pub fn undistort_equidistant(c: &DistortionCoeffs, p: &Vector2<f64>) -> Result<Vector2<f64>> {
    let theta_d = p.norm();
    if theta_d < EQUIDISTANT_MIN_RADIUS {
        return Ok(*p);
    }

    let mut theta = theta_d;
    for _ in 0..EQUIDISTANT_INVERSE_ITERATIONS {
        let theta2 = theta * theta;
        let theta4 = theta2 * theta2;
        let theta6 = theta4 * theta2;
        let theta8 = theta4 * theta4;

        let f = theta * (1.0 + c.k1 * theta2 + c.k2 * theta4 + c.k3 * theta6 + c.k4 * theta8)
            - theta_d;
        let df = 1.0
            + 3.0 * c.k1 * theta2
            + 5.0 * c.k2 * theta4
            + 7.0 * c.k3 * theta6
            + 9.0 * c.k4 * theta8;

        let step = f / df;
        theta -= step;
        if step.abs() < 1e-14 {
            break;
        }
    }

    if !theta.is_finite() {
        return Err(ProjectionError::NonFinite("equidistant inverse"));
    }
    if !(0.0..FRAC_PI_2).contains(&theta) {
        return Err(ProjectionError::OutsideValidRadius {
            radius: theta,
            limit: FRAC_PI_2,
        });
    }

    Ok(p * (theta.tan() / theta_d))
}

impl Camera {
    /// Apply the configured distortion to a normalized plane point
    pub fn distort(&self, p: &Vector2<f64>) -> Result<Vector2<f64>> {
        self.evaluate(p, self.refractive_index()).map(|(out, _, _)| out)
    }

    /// Apply the configured distortion and return d(out)/d(in)
    pub fn distort_with_jacobian(&self, p: &Vector2<f64>) -> Result<(Vector2<f64>, Matrix2<f64>)> {
        self.evaluate(p, self.refractive_index())
            .map(|(out, j, _)| (out, j))
    }

    /// Apply the configured distortion with an explicit refractive index
    pub fn distort_with_index(&self, p: &Vector2<f64>, n: f64) -> Result<Vector2<f64>> {
        self.evaluate(p, n).map(|(out, _, _)| out)
    }

    /// Apply the configured distortion with an explicit refractive index and
    /// return d(out)/d(in)
    pub fn distort_with_index_jacobian(
        &self,
        p: &Vector2<f64>,
        n: f64,
    ) -> Result<(Vector2<f64>, Matrix2<f64>)> {
        self.evaluate(p, n).map(|(out, j, _)| (out, j))
    }

    /// d(out)/dn at index `n`; zero for models that do not refract
    pub fn distort_index_derivative(&self, p: &Vector2<f64>, n: f64) -> Result<Vector2<f64>> {
        self.evaluate(p, n).map(|(_, _, dn)| dn)
    }

    /// Refractive stage with index `n` followed by the equidistant stage with
    /// this camera's `k1..k4`, keeping both stage Jacobians
    pub fn distort_equirefractive_stages(
        &self,
        p: &Vector2<f64>,
        n: f64,
    ) -> Result<EquiRefractiveStages> {
        let (refracted, j_refractive) = distort_refractive(n, p)?;
        let (point, j_equidistant) = distort_equidistant(self.coefficients(), &refracted);
        Ok(EquiRefractiveStages {
            point,
            refracted,
            j_equidistant,
            j_refractive,
        })
    }

    /// Distorted point, d(out)/d(in) and d(out)/dn in one pass
    pub(super) fn evaluate(
        &self,
        p: &Vector2<f64>,
        n: f64,
    ) -> Result<(Vector2<f64>, Matrix2<f64>, Vector2<f64>)> {
        if !(p.x.is_finite() && p.y.is_finite()) {
            return Err(ProjectionError::NonFinite("plane point"));
        }

        let c = self.coefficients();
        let (out, j, dn) = match self.model() {
            DistortionModel::RadTan => {
                let (out, j) = distort_radtan(c, p);
                (out, j, Vector2::zeros())
            }
            DistortionModel::Equidistant => {
                let (out, j) = distort_equidistant(c, p);
                (out, j, Vector2::zeros())
            }
            DistortionModel::DoubleSphere => {
                let (out, j) = distort_double_sphere(c, p);
                (out, j, Vector2::zeros())
            }
            DistortionModel::Refractive => {
                let (out, j) = distort_refractive(n, p)?;
                (out, j, refractive_index_derivative(n, p)?)
            }
            DistortionModel::EquiRefractive => {
                let stages = self.distort_equirefractive_stages(p, n)?;
                let dn = stages.j_equidistant * refractive_index_derivative(n, p)?;
                (stages.point, stages.jacobian(), dn)
            }
        };

        if out.iter().chain(j.iter()).chain(dn.iter()).any(|v| !v.is_finite()) {
            return Err(ProjectionError::NonFinite("distorted point"));
        }

        Ok((out, j, dn))
    }
}
