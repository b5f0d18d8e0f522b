//! Model artifact loader with process-wide memoization

use crate::error::ModelLoadError;
use crate::feature_catalog::{FEATURE_COUNT, MODEL_COLUMNS};
use crate::models::pipeline::{ForestPipeline, RawForestPipeline, ScoringPipeline};
use once_cell::sync::OnceCell;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// A loaded pipeline, shared read-only by every prediction
pub type SharedPipeline = Arc<dyn ScoringPipeline>;

/// Key under which a bundle artifact stores the pipeline next to its metadata
pub const BUNDLE_PIPELINE_KEY: &str = "pipeline";

/// Loads the scoring pipeline once and hands out the cached instance.
///
/// First access is guarded by a one-time-initialization cell, so concurrent
/// callers block until a single load finishes. A failed load leaves the cell
/// empty and the error goes to the caller.
pub struct ModelLoader {
    path: PathBuf,
    pipeline: OnceCell<SharedPipeline>,
    /// Number of times the artifact was actually read
    loads: AtomicUsize,
}

impl ModelLoader {
    /// Create a loader for the artifact at `path`. Nothing is read yet.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            pipeline: OnceCell::new(),
            loads: AtomicUsize::new(0),
        }
    }

    /// Create a loader that is already holding `pipeline`.
    pub fn with_pipeline(pipeline: SharedPipeline) -> Self {
        Self {
            path: PathBuf::new(),
            pipeline: OnceCell::with_value(pipeline),
            loads: AtomicUsize::new(0),
        }
    }

    /// Artifact location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The process-wide pipeline, loading it on first access.
    pub fn get_pipeline(&self) -> Result<SharedPipeline, ModelLoadError> {
        self.pipeline
            .get_or_try_init(|| {
                self.loads.fetch_add(1, Ordering::SeqCst);
                load_artifact(&self.path)
            })
            .map(Arc::clone)
    }

    /// Whether a pipeline is cached
    pub fn is_loaded(&self) -> bool {
        self.pipeline.get().is_some()
    }

    /// How many times the artifact has been read from disk
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Drop the cached pipeline so the next access reads the artifact again
    pub fn reset(&mut self) {
        self.pipeline.take();
    }
}

/// Read an artifact from disk without caching.
///
/// `.onnx` files go through ONNX Runtime (feature `onnx`); anything else is
/// parsed as a JSON pipeline, bare or bundled.
pub fn load_artifact(path: &Path) -> Result<SharedPipeline, ModelLoadError> {
    info!(path = %path.display(), "Loading model artifact");

    let is_onnx = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("onnx"))
        .unwrap_or(false);

    let pipeline = if is_onnx {
        load_onnx(path)?
    } else {
        let forest: SharedPipeline = Arc::new(load_json_pipeline(path)?);
        forest
    };

    check_columns(pipeline.as_ref())?;

    info!(
        model = %pipeline.name(),
        features = pipeline.n_features(),
        "Model loaded successfully"
    );

    Ok(pipeline)
}

#[cfg(feature = "onnx")]
fn load_onnx(path: &Path) -> Result<SharedPipeline, ModelLoadError> {
    Ok(Arc::new(crate::models::onnx::OnnxPipeline::load(path)?))
}

#[cfg(not(feature = "onnx"))]
fn load_onnx(path: &Path) -> Result<SharedPipeline, ModelLoadError> {
    Err(ModelLoadError::UnsupportedFormat(path.to_path_buf()))
}

/// Parse a JSON artifact and validate the pipeline inside it.
pub fn load_json_pipeline(path: &Path) -> Result<ForestPipeline, ModelLoadError> {
    let bytes = fs::read(path).map_err(|source| ModelLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let parse_error = |source| ModelLoadError::Parse {
        path: path.to_path_buf(),
        source,
    };

    let artifact: Value = serde_json::from_slice(&bytes).map_err(parse_error)?;
    let (inner, metadata) = unwrap_bundle(artifact);

    for (key, value) in metadata.iter().filter(|(_, v)| !v.is_object() && !v.is_array()) {
        debug!(key = %key, value = %value, "Model bundle metadata");
    }
    if !metadata.is_empty() {
        info!(entries = metadata.len(), "Unwrapped pipeline from model bundle");
    }

    let raw: RawForestPipeline = serde_json::from_value(inner).map_err(parse_error)?;
    let pipeline =
        ForestPipeline::try_from(raw).map_err(|reason| ModelLoadError::InvalidPipeline {
            path: path.to_path_buf(),
            reason,
        })?;

    debug!(trees = pipeline.n_trees(), steps = pipeline.steps().len(), "Pipeline validated");
    Ok(pipeline)
}

/// Split a bundle into its pipeline and the remaining metadata.
///
/// If the value is an object with a `pipeline` entry, that entry is the
/// pipeline; otherwise the value itself is.
pub fn unwrap_bundle(mut artifact: Value) -> (Value, Map<String, Value>) {
    if let Value::Object(map) = &mut artifact {
        if let Some(inner) = map.remove(BUNDLE_PIPELINE_KEY) {
            return (inner, std::mem::take(map));
        }
    }
    (artifact, Map::new())
}

/// Reject models whose input layout differs from the feature catalog.
fn check_columns(pipeline: &dyn ScoringPipeline) -> Result<(), ModelLoadError> {
    if pipeline.n_features() != FEATURE_COUNT {
        return Err(ModelLoadError::FeatureCountMismatch {
            found: pipeline.n_features(),
            expected: FEATURE_COUNT,
        });
    }

    if let Some(names) = pipeline.feature_names() {
        if !names.iter().map(String::as_str).eq(MODEL_COLUMNS.iter().copied()) {
            return Err(ModelLoadError::FeatureOrderMismatch {
                found: names.to_vec(),
                expected: MODEL_COLUMNS.iter().map(|c| c.to_string()).collect(),
            });
        }
    }

    Ok(())
}
