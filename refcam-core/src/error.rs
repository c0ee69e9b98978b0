use thiserror::Error;

use crate::camera::DistortionModel;

/// Common errors across the camera geometry core
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    #[error("Parameter error: {0}")]
    Parameter(#[from] ParameterError),
}

/// Recoverable failures of a single forward or inverse mapping.
///
/// None of these invalidate the camera; the caller drops the observation
/// (or falls back) and continues.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectionError {
    #[error("Point behind camera")]
    BehindCamera,

    #[error("Non-finite value in {0}")]
    NonFinite(&'static str),

    #[error("Refraction undefined: 1 + r^2 - n^2 r^2 = {0} is not positive")]
    RefractionDomain(f64),

    #[error("Radius {radius} exceeds valid radius {limit}")]
    OutsideValidRadius { radius: f64, limit: f64 },

    #[error("Projection did not converge after {0} iterations")]
    NoConvergence(usize),

    #[error("Singular distortion Jacobian")]
    SingularJacobian,

    #[error("No analytic inverse for distortion model {0}")]
    UnsupportedModel(DistortionModel),
}

/// Invalid camera configuration, reported once when the parameter set is built
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Unknown distortion model: {0}")]
    UnknownModel(String),

    #[error("Invalid focal length: fx = {fx}, fy = {fy}")]
    InvalidFocalLength { fx: f64, fy: f64 },

    #[error("Invalid refractive index: {0} (must be >= 1)")]
    InvalidRefractiveIndex(f64),

    #[error("Invalid valid radius: {0} (must be > 0)")]
    InvalidValidRadius(f64),

    #[error("Non-finite parameter: {0}")]
    NonFinite(&'static str),
}

pub type Result<T> = std::result::Result<T, CameraError>;
