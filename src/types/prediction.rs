//! Risk prediction results handed back to the presentation layer

use crate::types::record::ScoredInput;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Page title of the calculator
pub const TITLE: &str = "Postoperative Persistent Hypoproteinemia Risk Calculator";

/// Caption shown under the title
pub const CAPTION: &str = "Based on a Random Forest machine learning model";

/// Instructions shown above the input fields
pub const INSTRUCTIONS: &str = "Enter the following clinical indicators to estimate the risk \
probability of postoperative persistent hypoproteinemia.";

/// Standing disclaimer rendered at the bottom of every page
pub const DISCLAIMER: &str = "Note: This tool is intended for research and clinical decision \
support only and should not replace clinical judgment.";

/// Render a probability as a percentage with two decimals.
pub fn format_percentage(probability: f64) -> String {
    format!("{:.2}%", probability * 100.0)
}

/// Outcome of one successful prediction request.
///
/// Probability only: there is deliberately no threshold or risk band.
#[derive(Debug, Clone, Serialize)]
pub struct RiskPrediction {
    /// Correlates log events for this request
    pub request_id: String,

    /// Probability of the positive (adverse outcome) class, 0.0 - 1.0
    pub probability: f64,

    /// Scoring timestamp
    pub scored_at: DateTime<Utc>,

    /// The exact row the model scored
    pub inputs: ScoredInput,
}

impl RiskPrediction {
    /// Create a new prediction record
    pub fn new(probability: f64, inputs: ScoredInput) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            probability,
            scored_at: Utc::now(),
            inputs,
        }
    }

    /// "Predicted risk probability: 12.34%"
    pub fn headline(&self) -> String {
        format!("Predicted risk probability: {}", format_percentage(self.probability))
    }

    /// Plain-text table of the values used for prediction
    pub fn input_table(&self) -> String {
        let width = self
            .inputs
            .columns()
            .iter()
            .map(|c| c.chars().count())
            .max()
            .unwrap_or(0);

        let mut out = String::from("Input values used for prediction:\n");
        for (column, value) in self.inputs.iter() {
            let pad = width.saturating_sub(column.chars().count());
            out.push_str(&format!("  {}{}  {:>12.4}\n", column, " ".repeat(pad), value));
        }
        out
    }
}

impl fmt::Display for RiskPrediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.headline())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_catalog::FEATURE_COUNT;

    #[test]
    fn test_headline_formatting() {
        let prediction = RiskPrediction::new(0.25, ScoredInput::new([1.0; FEATURE_COUNT]));
        assert_eq!(prediction.headline(), "Predicted risk probability: 25.00%");
        assert_eq!(prediction.to_string(), prediction.headline());
    }

    #[test]
    fn test_format_percentage_bounds() {
        assert_eq!(format_percentage(0.0), "0.00%");
        assert_eq!(format_percentage(1.0), "100.00%");
    }

    #[test]
    fn test_input_table_lists_every_column() {
        let prediction = RiskPrediction::new(0.5, ScoredInput::new([1.5; FEATURE_COUNT]));
        let table = prediction.input_table();

        for column in prediction.inputs.columns() {
            assert!(table.contains(column));
        }
        assert_eq!(table.lines().count(), FEATURE_COUNT + 1);
        assert!(table.contains("1.5000"));
    }

    #[test]
    fn test_prediction_serialization() {
        let prediction = RiskPrediction::new(0.42, ScoredInput::new([0.0; FEATURE_COUNT]));
        let json = serde_json::to_value(&prediction).unwrap();

        assert_eq!(json["probability"], 0.42);
        assert_eq!(json["inputs"]["钙"], 0.0);
        assert!(uuid::Uuid::parse_str(json["request_id"].as_str().unwrap()).is_ok());
    }
}
