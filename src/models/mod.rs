//! Model loading and inference components

pub mod inference;
pub mod loader;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod pipeline;

pub use inference::InferenceEngine;
pub use loader::{ModelLoader, SharedPipeline};
pub use pipeline::{ForestPipeline, RawForestPipeline, ScoringPipeline};
