use refcam_core::ParameterError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("Failed to read calibration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed calibration YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{field} must have {expected} entries, got {got}")]
    BadMatrixSize {
        field: &'static str,
        expected: &'static str,
        got: usize,
    },

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    Parameter(#[from] ParameterError),
}

pub type Result<T> = std::result::Result<T, CalibrationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CalibrationError::BadMatrixSize {
            field: "camera_matrix",
            expected: "9",
            got: 4,
        };
        assert_eq!(err.to_string(), "camera_matrix must have 9 entries, got 4");

        let err = CalibrationError::MissingField("distortion_coefficients");
        assert_eq!(err.to_string(), "Missing field: distortion_coefficients");
    }

    #[test]
    fn test_parameter_error_is_transparent() {
        let err: CalibrationError = ParameterError::UnknownModel("pinhole".into()).into();
        assert_eq!(
            err.to_string(),
            ParameterError::UnknownModel("pinhole".into()).to_string()
        );
    }
}
