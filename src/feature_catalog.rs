//! Feature catalog for hypoproteinemia risk model inference.
//!
//! The form speaks English display names; the random forest was trained on
//! a dataframe with Chinese column names. This module owns the mapping
//! between the two and the column order the model was trained with.

use crate::error::MissingFeaturesError;
use crate::types::record::{InputRecord, ScoredInput};
use tracing::warn;

/// Number of clinical indicators the model consumes.
pub const FEATURE_COUNT: usize = 10;

/// One catalog entry: what the user sees and what the model was trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureMapping {
    /// Human-readable indicator name shown on the form
    pub display: &'static str,
    /// Column name in the training dataframe
    pub column: &'static str,
}

/// Display name -> model column, in form order.
pub const FEATURE_MAP: [FeatureMapping; FEATURE_COUNT] = [
    FeatureMapping { display: "Carcinoembryonic antigen (CEA)", column: "癌胚抗原" },
    FeatureMapping { display: "Total cholesterol", column: "胆固醇" },
    FeatureMapping { display: "Calcium", column: "钙" },
    FeatureMapping { display: "Triglycerides", column: "甘油三酯" },
    FeatureMapping { display: "Indirect bilirubin", column: "间接胆红素" },
    FeatureMapping { display: "Magnesium", column: "镁" },
    FeatureMapping { display: "Uric acid", column: "尿酸" },
    FeatureMapping { display: "Prothrombin time (PT)", column: "凝血酶原时间" },
    FeatureMapping { display: "Hemoglobin", column: "血红蛋白" },
    FeatureMapping { display: "Total bilirubin", column: "总胆红素" },
];

/// Column order of the training dataframe. Tree ensembles are order
/// sensitive and will not complain about a permuted row.
pub const MODEL_COLUMNS: [&str; FEATURE_COUNT] = [
    "癌胚抗原",
    "胆固醇",
    "钙",
    "甘油三酯",
    "间接胆红素",
    "镁",
    "尿酸",
    "凝血酶原时间",
    "血红蛋白",
    "总胆红素",
];

/// For each position in `MODEL_COLUMNS`, the index of the `FEATURE_MAP`
/// entry that feeds it. Evaluated at compile time.
const SLOTS: [usize; FEATURE_COUNT] = resolve_slots(&FEATURE_MAP, &MODEL_COLUMNS);

const fn str_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}

/// Match every training column to exactly one catalog entry.
///
/// Panics when a column has no entry or two columns share one; in a const
/// context that is a build error.
const fn resolve_slots(
    map: &[FeatureMapping; FEATURE_COUNT],
    columns: &[&str; FEATURE_COUNT],
) -> [usize; FEATURE_COUNT] {
    let mut slots = [0usize; FEATURE_COUNT];
    let mut used = [false; FEATURE_COUNT];
    let mut i = 0;
    while i < FEATURE_COUNT {
        let mut j = 0;
        while j < FEATURE_COUNT && !str_eq(map[j].column, columns[i]) {
            j += 1;
        }
        assert!(j < FEATURE_COUNT, "model column has no feature mapping");
        assert!(!used[j], "feature mapping feeds more than one model column");
        used[j] = true;
        slots[i] = j;
        i += 1;
    }
    slots
}

/// Validates input records and lays them out in training order.
#[derive(Debug, Clone)]
pub struct FeatureCatalog {
    slots: [usize; FEATURE_COUNT],
}

impl FeatureCatalog {
    pub fn new() -> Self {
        Self { slots: SLOTS }
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        FEATURE_COUNT
    }

    /// Display names in form order.
    pub fn display_names(&self) -> impl Iterator<Item = &'static str> {
        FEATURE_MAP.iter().map(|m| m.display)
    }

    /// Model column names in training order.
    pub fn model_columns(&self) -> &'static [&'static str; FEATURE_COUNT] {
        &MODEL_COLUMNS
    }

    /// Look up the model column for a display name.
    pub fn column_for(&self, display: &str) -> Option<&'static str> {
        FEATURE_MAP
            .iter()
            .find(|m| m.display == display)
            .map(|m| m.column)
    }

    /// Display names the record does not provide (absent or NaN), in form order.
    pub fn missing(&self, record: &InputRecord) -> Vec<String> {
        FEATURE_MAP
            .iter()
            .filter(|m| record.value(m.display).is_none())
            .map(|m| m.display.to_string())
            .collect()
    }

    /// Validate a record and remap it to the model's column layout.
    ///
    /// Fails with every missing display name at once; never produces a
    /// partially filled row.
    pub fn remap(&self, record: &InputRecord) -> Result<ScoredInput, MissingFeaturesError> {
        let missing = self.missing(record);
        if !missing.is_empty() {
            return Err(MissingFeaturesError::new(missing));
        }

        for key in record.keys() {
            if self.column_for(key).is_none() {
                warn!(field = %key, "Ignoring field that is not part of the feature catalog");
            }
        }

        let mut values = [0.0_f64; FEATURE_COUNT];
        for (value, &index) in values.iter_mut().zip(self.slots.iter()) {
            let display = FEATURE_MAP[index].display;
            *value = record
                .value(display)
                .ok_or_else(|| MissingFeaturesError::new(vec![display.to_string()]))?;
        }

        Ok(ScoredInput::new(values))
    }
}

impl Default for FeatureCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn complete_record(value: f64) -> InputRecord {
        FEATURE_MAP
            .iter()
            .map(|m| (m.display.to_string(), value))
            .collect()
    }

    #[test]
    fn catalog_is_consistent() {
        let displays: HashSet<_> = FEATURE_MAP.iter().map(|m| m.display).collect();
        let columns: HashSet<_> = FEATURE_MAP.iter().map(|m| m.column).collect();
        let trained: HashSet<_> = MODEL_COLUMNS.iter().copied().collect();

        assert_eq!(displays.len(), FEATURE_COUNT);
        assert_eq!(columns.len(), FEATURE_COUNT);
        assert_eq!(columns, trained);
    }

    #[test]
    fn test_slots_follow_training_order() {
        for (column, &index) in MODEL_COLUMNS.iter().zip(SLOTS.iter()) {
            assert_eq!(FEATURE_MAP[index].column, *column);
        }
    }

    #[test]
    #[should_panic(expected = "model column has no feature mapping")]
    fn test_unmapped_column_panics() {
        let mut columns = MODEL_COLUMNS;
        columns[3] = "白蛋白";
        resolve_slots(&FEATURE_MAP, &columns);
    }

    #[test]
    #[should_panic(expected = "feeds more than one model column")]
    fn test_duplicate_column_panics() {
        let mut columns = MODEL_COLUMNS;
        columns[9] = columns[0];
        resolve_slots(&FEATURE_MAP, &columns);
    }

    #[test]
    fn test_remap_uses_training_order() {
        let catalog = FeatureCatalog::new();
        let record: InputRecord = FEATURE_MAP
            .iter()
            .enumerate()
            .map(|(i, m)| (m.display.to_string(), i as f64))
            .collect();

        let scored = catalog.remap(&record).unwrap();

        let columns: Vec<_> = scored.iter().map(|(c, _)| c).collect();
        assert_eq!(columns, MODEL_COLUMNS.to_vec());
        for (column, value) in scored.iter() {
            let index = FEATURE_MAP.iter().position(|m| m.column == column).unwrap();
            assert_eq!(value, index as f64);
        }
    }

    #[test]
    fn test_all_ones_row() {
        let catalog = FeatureCatalog::new();
        let scored = catalog.remap(&complete_record(1.0)).unwrap();

        assert_eq!(scored.values().len(), FEATURE_COUNT);
        assert!(scored.values().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_reports_every_missing_field() {
        let catalog = FeatureCatalog::new();
        let mut record = complete_record(2.5);
        record.remove("Calcium");
        record.set("Hemoglobin", f64::NAN);

        let err = catalog.remap(&record).unwrap_err();
        assert_eq!(err.missing(), ["Calcium".to_string(), "Hemoglobin".to_string()]);
    }

    #[test]
    fn test_empty_record_misses_everything() {
        let catalog = FeatureCatalog::new();
        let err = catalog.remap(&InputRecord::new()).unwrap_err();

        let expected: Vec<String> = catalog.display_names().map(String::from).collect();
        assert_eq!(err.missing(), expected.as_slice());
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let catalog = FeatureCatalog::new();
        let mut record = complete_record(3.0);
        record.set("Albumin", 40.0);

        let scored = catalog.remap(&record).unwrap();
        assert!(scored.iter().all(|(c, _)| c != "Albumin"));
    }

    #[test]
    fn test_column_lookup() {
        let catalog = FeatureCatalog::new();
        assert_eq!(catalog.column_for("Total bilirubin"), Some("总胆红素"));
        assert_eq!(catalog.column_for("总胆红素"), None);
        assert_eq!(catalog.feature_count(), 10);
        assert_eq!(catalog.model_columns().len(), 10);
    }
}
