//! Input records submitted from the form and their model-ready layout

use crate::feature_catalog::{FEATURE_COUNT, MODEL_COLUMNS};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;

/// Laboratory values for a single patient, keyed by display name.
///
/// A value of NaN means the field was left unset on the form; it is treated
/// exactly like an absent key. `null` in JSON deserializes to NaN.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "HashMap<String, Option<f64>>")]
pub struct InputRecord {
    values: HashMap<String, f64>,
}

impl InputRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field
    pub fn set(&mut self, display: impl Into<String>, value: f64) {
        self.values.insert(display.into(), value);
    }

    /// Mark a field as unset without removing it
    pub fn unset(&mut self, display: impl Into<String>) {
        self.values.insert(display.into(), f64::NAN);
    }

    /// Remove a field entirely
    pub fn remove(&mut self, display: &str) -> Option<f64> {
        self.values.remove(display)
    }

    /// The value of a field, `None` if absent or NaN
    pub fn value(&self, display: &str) -> Option<f64> {
        self.values.get(display).copied().filter(|v| !v.is_nan())
    }

    /// All keys present in the record, set or not
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, f64)> for InputRecord {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl From<HashMap<String, Option<f64>>> for InputRecord {
    fn from(raw: HashMap<String, Option<f64>>) -> Self {
        raw.into_iter()
            .map(|(k, v)| (k, v.unwrap_or(f64::NAN)))
            .collect()
    }
}

/// One model row: validated values in training column order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredInput {
    values: [f64; FEATURE_COUNT],
}

impl ScoredInput {
    pub(crate) fn new(values: [f64; FEATURE_COUNT]) -> Self {
        Self { values }
    }

    /// Row values, aligned with `MODEL_COLUMNS`
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Column names, in training order
    pub fn columns(&self) -> &'static [&'static str; FEATURE_COUNT] {
        &MODEL_COLUMNS
    }

    /// (column, value) pairs in training order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        MODEL_COLUMNS.iter().copied().zip(self.values.iter().copied())
    }

    /// Value of a single model column
    pub fn get(&self, column: &str) -> Option<f64> {
        self.iter().find(|(c, _)| *c == column).map(|(_, v)| v)
    }
}

impl Serialize for ScoredInput {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}
