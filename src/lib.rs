//! Hypoproteinemia Risk Calculator Library
//!
//! Estimates the probability of postoperative persistent hypoproteinemia
//! from ten laboratory values, using a pre-trained random forest pipeline.

pub mod config;
pub mod error;
pub mod feature_catalog;
pub mod form;
pub mod metrics;
pub mod models;
pub mod types;

pub use crate::config::AppConfig;
pub use error::{MissingFeaturesError, ModelLoadError, PredictError};
pub use feature_catalog::FeatureCatalog;
pub use models::inference::InferenceEngine;
pub use models::loader::ModelLoader;
pub use types::{prediction::RiskPrediction, record::InputRecord};
