//! ROS `camera_info`-style YAML calibration files.
//!
//! ```yaml
//! distortion_model: equirefractive
//! camera_matrix: { rows: 3, cols: 3, data: [fx, 0, cx, 0, fy, cy, 0, 0, 1] }
//! distortion_coefficients: { rows: 1, cols: 4, data: [k1, k2, k3, k4] }
//! refractive_index: 1.33
//! ```
//!
//! Unknown keys (`image_width`, `camera_name`, ...) are ignored.

use std::fs;
use std::path::Path;

use nalgebra::Matrix3;
use refcam_core::{Camera, DistortionCoeffs, DistortionModel};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{CalibrationError, Result};

#[derive(Debug, Deserialize)]
struct RawCalibration {
    distortion_model: String,
    camera_matrix: RawMatrix,
    #[serde(default)]
    distortion_coefficients: Option<RawMatrix>,
    #[serde(default)]
    refractive_index: Option<RawScalar>,
    #[serde(default)]
    valid_radius: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawMatrix {
    #[serde(default)]
    rows: Option<usize>,
    #[serde(default)]
    cols: Option<usize>,
    data: Vec<f64>,
}

/// Either `refractive_index: 1.33` or `refractive_index: { data: [1.33] }`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawScalar {
    Value(f64),
    Wrapped { data: Vec<f64> },
}

impl RawMatrix {
    /// Data, checked against the declared shape and the accepted lengths
    fn checked(
        &self,
        field: &'static str,
        accepted: &[usize],
        expected: &'static str,
    ) -> Result<&[f64]> {
        let got = self.data.len();
        let declared = match (self.rows, self.cols) {
            // An overflowing shape cannot match any data length
            (Some(rows), Some(cols)) => Some(rows.checked_mul(cols)),
            _ => None,
        };
        if !accepted.contains(&got) || declared.is_some_and(|d| d != Some(got)) {
            return Err(CalibrationError::BadMatrixSize {
                field,
                expected,
                got,
            });
        }
        Ok(&self.data)
    }
}

impl RawScalar {
    fn value(&self) -> Result<f64> {
        match self {
            RawScalar::Value(v) => Ok(*v),
            RawScalar::Wrapped { data } => match data.as_slice() {
                [v] => Ok(*v),
                _ => Err(CalibrationError::BadMatrixSize {
                    field: "refractive_index",
                    expected: "1",
                    got: data.len(),
                }),
            },
        }
    }
}

fn coefficients(raw: &RawCalibration, model: DistortionModel) -> Result<DistortionCoeffs> {
    let field = "distortion_coefficients";
    let matrix = || {
        raw.distortion_coefficients
            .as_ref()
            .ok_or(CalibrationError::MissingField(field))
    };

    let coeffs = match model {
        DistortionModel::RadTan => {
            // The rational k4..k6 terms are not modeled
            let d = matrix()?.checked(field, &[4, 5], "4 or 5")?;
            DistortionCoeffs {
                k1: d[0],
                k2: d[1],
                p1: d[2],
                p2: d[3],
                k3: d.get(4).copied().unwrap_or(0.0),
                ..Default::default()
            }
        }
        DistortionModel::Equidistant | DistortionModel::EquiRefractive => {
            let d = matrix()?.checked(field, &[4], "4")?;
            DistortionCoeffs {
                k1: d[0],
                k2: d[1],
                k3: d[2],
                k4: d[3],
                ..Default::default()
            }
        }
        DistortionModel::DoubleSphere => {
            let d = matrix()?.checked(field, &[2], "2")?;
            DistortionCoeffs {
                k1: d[0],
                k2: d[1],
                ..Default::default()
            }
        }
        DistortionModel::Refractive => DistortionCoeffs::default(),
    };
    Ok(coeffs)
}

/// Build a validated camera from the contents of a calibration file
pub fn parse_calibration(yaml: &str) -> Result<Camera> {
    let raw: RawCalibration = serde_yaml::from_str(yaml)?;
    let model: DistortionModel = raw.distortion_model.parse()?;

    let k = raw.camera_matrix.checked("camera_matrix", &[9], "9")?;
    let intrinsics = Matrix3::from_row_slice(k);
    let coeffs = coefficients(&raw, model)?;

    let mut camera = Camera::default()
        .with_intrinsics(intrinsics)
        .with_model(model)
        .with_coefficients(coeffs);

    match &raw.refractive_index {
        Some(index) => camera = camera.with_refractive_index(index.value()?),
        None if model.is_refractive() => {
            warn!(
                model = %model,
                "No refractive_index given, keeping {}",
                camera.refractive_index()
            );
        }
        None => {}
    }
    if let Some(radius) = raw.valid_radius {
        camera = camera.with_valid_radius(radius);
    }

    camera.validate()?;

    let (fx, fy) = camera.focal_length();
    let (cx, cy) = camera.principal_point();
    info!(
        model = %model,
        fx,
        fy,
        cx,
        cy,
        coefficients = ?coeffs,
        refractive_index = camera.refractive_index(),
        valid_radius = camera.valid_radius(),
        "Loaded camera calibration"
    );
    Ok(camera)
}

/// Read and parse a calibration file
pub fn load_calibration<P: AsRef<Path>>(path: P) -> Result<Camera> {
    let path = path.as_ref();
    info!("Reading calibration from {}", path.display());
    let yaml = fs::read_to_string(path)?;
    parse_calibration(&yaml)
}
