//! Error types for model loading and risk prediction

use std::path::PathBuf;
use thiserror::Error;

/// Fatal failure to bring the scoring pipeline into memory.
///
/// No prediction can be served without a loaded model, so callers are
/// expected to abort startup (or surface a blocking error) on this.
#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("Failed to read model artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse model artifact {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Model artifact {path} is not a valid scoring pipeline: {reason}")]
    InvalidPipeline { path: PathBuf, reason: String },
    #[error("Model expects {found} input features, but the calculator supplies {expected}")]
    FeatureCountMismatch { found: usize, expected: usize },
    #[error("Model was trained on columns {found:?}, expected {expected:?}")]
    FeatureOrderMismatch {
        found: Vec<String>,
        expected: Vec<String>,
    },
    #[error("Unsupported model artifact format: {0}")]
    UnsupportedFormat(PathBuf),
    #[error("ONNX Runtime failed to load {path}: {message}")]
    Onnx { path: PathBuf, message: String },
}

/// A submission that lacks one or more required clinical indicators.
///
/// Lists every missing display identifier, in catalog order.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("The following variables are missing: {}", .missing.join(", "))]
pub struct MissingFeaturesError {
    pub missing: Vec<String>,
}

impl MissingFeaturesError {
    pub fn new(missing: Vec<String>) -> Self {
        Self { missing }
    }

    /// Display identifiers that were absent or unset
    pub fn missing(&self) -> &[String] {
        &self.missing
    }
}

/// Runtime failure inside a loaded scoring backend
#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("Input row has {found} values, but the model expects {expected}")]
    RowLength { found: usize, expected: usize },
    #[error("Model returned {0} class probabilities, expected 2")]
    ClassCount(usize),
    #[error("Model returned probability {0} outside [0, 1]")]
    OutOfRange(f64),
    #[error("Inference backend failed: {0}")]
    Backend(String),
}

/// Any failure of a single prediction request
#[derive(Error, Debug)]
pub enum PredictError {
    #[error(transparent)]
    MissingFeatures(#[from] MissingFeaturesError),
    #[error(transparent)]
    ModelLoad(#[from] ModelLoadError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_features_message() {
        let err = MissingFeaturesError::new(vec!["Calcium".to_string(), "Hemoglobin".to_string()]);
        assert_eq!(
            err.to_string(),
            "The following variables are missing: Calcium, Hemoglobin"
        );
    }

    #[test]
    fn test_predict_error_is_transparent() {
        let err: PredictError = MissingFeaturesError::new(vec!["Magnesium".to_string()]).into();
        assert_eq!(err.to_string(), "The following variables are missing: Magnesium");
    }
}
