//! Error types for the classification harness

use thiserror::Error;

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Unsupported model: {0}")]
    UnsupportedModel(String),

    #[error("Search failure: {0}")]
    SearchFailure(String),

    #[error("Degenerate run {run}: {reason}")]
    DegenerateRun { run: usize, reason: String },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Evaluation error: {0}")]
    EvaluationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Render error: {0}")]
    RenderError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl HarnessError {
    /// Shorthand for an [`HarnessError::InvalidParameter`] error
    pub fn invalid_param(name: &str, value: impl ToString, reason: &str) -> Self {
        HarnessError::InvalidParameter {
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<polars::error::PolarsError> for HarnessError {
    fn from(err: polars::error::PolarsError) -> Self {
        HarnessError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for HarnessError {
    fn from(err: serde_json::Error) -> Self {
        HarnessError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for HarnessError {
    fn from(err: ndarray::ShapeError) -> Self {
        HarnessError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

impl From<image::ImageError> for HarnessError {
    fn from(err: image::ImageError) -> Self {
        HarnessError::RenderError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HarnessError::UnsupportedModel("naive_bayes".to_string());
        assert_eq!(err.to_string(), "Unsupported model: naive_bayes");

        let err = HarnessError::DegenerateRun {
            run: 3,
            reason: "single class".to_string(),
        };
        assert_eq!(err.to_string(), "Degenerate run 3: single class");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: HarnessError = io_err.into();
        assert!(matches!(err, HarnessError::IoError(_)));
    }

    #[test]
    fn test_invalid_param_helper() {
        let err = HarnessError::invalid_param("C", -1.0, "must be positive");
        assert_eq!(err.to_string(), "Invalid parameter: C = -1, must be positive");
    }
}
