//! Inference adapter: validates form input, remaps it, and scores it

use crate::config::AppConfig;
use crate::error::{ModelLoadError, PredictError};
use crate::feature_catalog::FeatureCatalog;
use crate::models::loader::ModelLoader;
use crate::types::prediction::RiskPrediction;
use crate::types::record::{InputRecord, ScoredInput};
use std::sync::Arc;
use tracing::{debug, info};

/// Turns input records into positive-class probabilities.
///
/// Holds no mutable state of its own; the only shared resource is the
/// pipeline cached by the loader.
pub struct InferenceEngine {
    loader: Arc<ModelLoader>,
    catalog: FeatureCatalog,
}

impl InferenceEngine {
    /// Create an engine on top of a (possibly not yet loaded) model
    pub fn new(loader: Arc<ModelLoader>) -> Self {
        Self {
            loader,
            catalog: FeatureCatalog::new(),
        }
    }

    /// Create an engine for the artifact named in the configuration
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(Arc::new(ModelLoader::new(&config.model.path)))
    }

    pub fn catalog(&self) -> &FeatureCatalog {
        &self.catalog
    }

    pub fn loader(&self) -> &ModelLoader {
        &self.loader
    }

    /// Load the model now instead of on the first prediction
    pub fn warm_up(&self) -> Result<(), ModelLoadError> {
        let pipeline = self.loader.get_pipeline()?;
        info!(
            model = %pipeline.name(),
            features = pipeline.n_features(),
            "Inference engine ready"
        );
        Ok(())
    }

    /// Probability of the adverse outcome for one record.
    pub fn predict(&self, record: &InputRecord) -> Result<f64, PredictError> {
        let (probability, _) = self.score(record)?;
        Ok(probability)
    }

    /// Like `predict`, but also returns the scored row and request metadata
    /// for display.
    pub fn assess(&self, record: &InputRecord) -> Result<RiskPrediction, PredictError> {
        let (probability, inputs) = self.score(record)?;
        let prediction = RiskPrediction::new(probability, inputs);

        debug!(
            request_id = %prediction.request_id,
            probability = prediction.probability,
            "Prediction complete"
        );

        Ok(prediction)
    }

    /// Load errors are reported before input validation so that a broken
    /// model blocks every caller.
    fn score(&self, record: &InputRecord) -> Result<(f64, ScoredInput), PredictError> {
        let pipeline = self.loader.get_pipeline()?;
        let inputs = self.catalog.remap(record)?;
        let probability = pipeline.predict_probability(inputs.values())?;
        Ok((probability, inputs))
    }
}
