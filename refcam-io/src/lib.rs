//! Calibration file loading for refcam cameras

pub mod calibration;
pub mod error;

pub use calibration::{load_calibration, parse_calibration};
pub use error::{CalibrationError, Result};
