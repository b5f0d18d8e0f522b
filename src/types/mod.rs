//! Type definitions for the risk calculator

pub mod prediction;
pub mod record;

pub use prediction::RiskPrediction;
pub use record::{InputRecord, ScoredInput};
