//! Camera models and projections

mod distortion;
mod inversion;
mod manifold;
mod params;
mod projection;

#[cfg(test)]
mod verification;

pub use distortion::{
    EquiRefractiveStages, distort_double_sphere, distort_equidistant, distort_radtan,
    distort_refractive, refractive_index_derivative, undistort_equidistant,
};
pub use inversion::{MAX_ITERATIONS, TOLERANCE};
pub use manifold::{BearingManifold, UnitBearing};
pub use params::{Camera, DistortionCoeffs, DistortionModel};
pub use projection::{NormalJacobians, PixelJacobians};

use crate::error::ProjectionError;

type Result<T> = std::result::Result<T, ProjectionError>;
