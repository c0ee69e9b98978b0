//! Camera geometry core: bearing/pixel mappings for pinhole, fisheye and
//! refractive (underwater) cameras, with the analytic Jacobians a recursive
//! estimator linearizes against.

pub mod camera;
pub mod error;

pub use camera::{
    BearingManifold, Camera, DistortionCoeffs, DistortionModel, EquiRefractiveStages,
    NormalJacobians, PixelJacobians, UnitBearing,
};
pub use error::{CameraError, ParameterError, ProjectionError, Result};
