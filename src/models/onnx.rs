//! ONNX Runtime backend for pipelines exported with skl2onnx

use crate::error::{ModelLoadError, ScoringError};
use crate::models::pipeline::ScoringPipeline;
use ort::memory::Allocator;
use ort::session::{builder::GraphOptimizationLevel, Session, SessionOutputs};
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, DynValue, Tensor};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// A loaded ONNX session with its input/output names
pub struct OnnxPipeline {
    /// Running a session needs `&mut`, the pipeline itself is shared
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    n_features: usize,
}

impl OnnxPipeline {
    /// Load an ONNX model from file
    pub fn load(path: &Path) -> Result<Self, ModelLoadError> {
        let onnx_error = |e: ort::Error| ModelLoadError::Onnx {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        ort::init().commit().map_err(onnx_error)?;

        let session = Session::builder()
            .map_err(onnx_error)?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(onnx_error)?
            .with_intra_threads(1)
            .map_err(onnx_error)?
            .commit_from_file(path)
            .map_err(onnx_error)?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .or_else(|| session.outputs.last())
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "probabilities".to_string());

        // skl2onnx exports `float_input` as [None, n_features]
        let n_features = session
            .inputs
            .first()
            .and_then(|i| i.input_type.tensor_shape())
            .and_then(|shape| shape.last().copied())
            .filter(|&d| d > 0)
            .map(|d| d as usize)
            .unwrap_or(crate::feature_catalog::FEATURE_COUNT);

        info!(
            path = %path.display(),
            input = %input_name,
            output = %output_name,
            n_features,
            "ONNX model loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            n_features,
        })
    }

    fn extract_proba(&self, outputs: &SessionOutputs) -> Result<Vec<f64>, ScoringError> {
        if let Some(output) = outputs.get(self.output_name.as_str()) {
            if let Some(proba) = Self::extract_from_value(output)? {
                return Ok(proba);
            }
        }

        for (name, output) in outputs.iter() {
            if name.contains("label") {
                continue;
            }
            if let Some(proba) = Self::extract_from_value(&output)? {
                debug!(output = %name, "Extracted probabilities from fallback output");
                return Ok(proba);
            }
        }

        Err(ScoringError::Backend(
            "model produced no probability output".to_string(),
        ))
    }

    /// Handles `[1, n_classes]` tensors and `seq(map(int64, float))`
    fn extract_from_value(output: &DynValue) -> Result<Option<Vec<f64>>, ScoringError> {
        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            let n_classes = shape.last().copied().unwrap_or(0).max(0) as usize;
            return Ok(Some(data.iter().take(n_classes).map(|&p| p as f64).collect()));
        }

        let dtype = output.dtype();
        if !DynSequenceValueType::can_downcast(&dtype) {
            return Ok(None);
        }

        let allocator = Allocator::default();
        let sequence = output
            .downcast_ref::<DynSequenceValueType>()
            .map_err(backend_error)?;
        let maps = sequence
            .try_extract_sequence::<DynMapValueType>(&allocator)
            .map_err(backend_error)?;
        let first = maps
            .first()
            .ok_or_else(|| ScoringError::Backend("empty probability sequence".to_string()))?;

        let mut pairs = first
            .try_extract_key_values::<i64, f32>()
            .map_err(backend_error)?;
        pairs.sort_by_key(|(class, _)| *class);
        Ok(Some(pairs.into_iter().map(|(_, p)| p as f64).collect()))
    }
}

fn backend_error(e: ort::Error) -> ScoringError {
    ScoringError::Backend(e.to_string())
}

impl ScoringPipeline for OnnxPipeline {
    fn name(&self) -> &str {
        "onnx"
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>, ScoringError> {
        let features: Vec<f32> = row.iter().map(|&x| x as f32).collect();
        let input = Tensor::from_array((vec![1_i64, features.len() as i64], features))
            .map_err(backend_error)?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| ScoringError::Backend(format!("Lock error: {}", e)))?;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(backend_error)?;

        self.extract_proba(&outputs)
    }
}
