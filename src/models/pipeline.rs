//! Scoring pipelines
//!
//! A pipeline maps one feature row to class probabilities. The native
//! implementation reads a scikit-learn style pipeline (optional
//! preprocessing steps followed by a random forest) serialized as JSON.

use crate::error::ScoringError;
use serde::{Deserialize, Serialize};

/// Marks a leaf in the flattened tree layout (`children_left == TREE_LEAF`)
pub const TREE_LEAF: i64 = -1;

/// A trained model that turns a feature row into class probabilities.
///
/// Implementations are immutable after load and shared across requests.
pub trait ScoringPipeline: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Number of input columns the model expects
    fn n_features(&self) -> usize;

    /// Column names seen at training time, if the artifact recorded them
    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    /// Class probabilities for one row, ordered `[negative, positive]`
    fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>, ScoringError>;

    /// Probability of the positive class (index 1)
    fn predict_probability(&self, row: &[f64]) -> Result<f64, ScoringError> {
        if row.len() != self.n_features() {
            return Err(ScoringError::RowLength {
                found: row.len(),
                expected: self.n_features(),
            });
        }

        let proba = self.predict_proba(row)?;
        if proba.len() != 2 {
            return Err(ScoringError::ClassCount(proba.len()));
        }

        let positive = proba[1];
        if !(0.0..=1.0).contains(&positive) {
            return Err(ScoringError::OutOfRange(positive));
        }
        Ok(positive)
    }
}

/// One decision tree in scikit-learn's flattened array layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    /// Per-node class counts (or fractions); only leaves are read
    pub value: Vec<Vec<f64>>,
}

impl DecisionTree {
    fn node_count(&self) -> usize {
        self.children_left.len()
    }

    /// Check array shapes and node references.
    ///
    /// Children must point strictly forward, which rules out cycles and
    /// guarantees `leaf_for` terminates.
    fn validate(&self, n_features: usize, n_classes: usize) -> Result<(), String> {
        let n = self.node_count();
        if n == 0 {
            return Err("tree has no nodes".to_string());
        }
        if self.children_right.len() != n
            || self.feature.len() != n
            || self.threshold.len() != n
            || self.value.len() != n
        {
            return Err(format!("tree arrays disagree on node count ({})", n));
        }

        for node in 0..n {
            let left = self.children_left[node];
            let right = self.children_right[node];

            if left == TREE_LEAF {
                if right != TREE_LEAF {
                    return Err(format!("node {} has only a right child", node));
                }
                let value = &self.value[node];
                if value.len() != n_classes {
                    return Err(format!(
                        "leaf {} has {} class values, expected {}",
                        node,
                        value.len(),
                        n_classes
                    ));
                }
                if value.iter().any(|v| !v.is_finite() || *v < 0.0) {
                    return Err(format!("leaf {} has a negative or non-finite value", node));
                }
                if value.iter().sum::<f64>() <= 0.0 {
                    return Err(format!("leaf {} has no samples", node));
                }
                continue;
            }

            for child in [left, right] {
                if child <= node as i64 || child >= n as i64 {
                    return Err(format!("node {} points to invalid child {}", node, child));
                }
            }
            let feature = self.feature[node];
            if feature < 0 || feature >= n_features as i64 {
                return Err(format!("node {} splits on unknown feature {}", node, feature));
            }
            if self.threshold[node].is_nan() {
                return Err(format!("node {} has a NaN threshold", node));
            }
        }

        Ok(())
    }

    /// Walk from the root to a leaf. `x[feature] <= threshold` goes left.
    fn leaf_for(&self, row: &[f64]) -> usize {
        let mut node = 0usize;
        while self.children_left[node] != TREE_LEAF {
            let feature = self.feature[node] as usize;
            node = if row[feature] <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        node
    }

    /// Normalized class distribution of the leaf the row lands in
    fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        let value = &self.value[self.leaf_for(row)];
        let total: f64 = value.iter().sum();
        value.iter().map(|v| v / total).collect()
    }
}

/// Random forest classifier: mean of per-tree probabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub n_features: usize,
    pub classes: Vec<i64>,
    pub trees: Vec<DecisionTree>,
}

impl RandomForest {
    fn validate(&self) -> Result<(), String> {
        if self.classes.len() != 2 {
            return Err(format!(
                "classifier must be binary, found {} classes",
                self.classes.len()
            ));
        }
        if self.trees.is_empty() {
            return Err("random forest has no trees".to_string());
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features, self.classes.len())
                .map_err(|e| format!("tree {}: {}", i, e))?;
        }
        Ok(())
    }

    fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        let mut proba = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            for (acc, p) in proba.iter_mut().zip(tree.predict_proba(row)) {
                *acc += p;
            }
        }
        let n_trees = self.trees.len() as f64;
        proba.iter_mut().for_each(|p| *p /= n_trees);
        proba
    }
}

/// A single pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    /// Replace NaN in column `i` with `statistics[i]`
    SimpleImputer { statistics: Vec<f64> },
    /// `(x - mean) / scale`, zero scale treated as 1
    StandardScaler { mean: Vec<f64>, scale: Vec<f64> },
    /// Terminal classifier
    RandomForest(RandomForest),
}

impl Step {
    fn kind(&self) -> &'static str {
        match self {
            Step::SimpleImputer { .. } => "simple_imputer",
            Step::StandardScaler { .. } => "standard_scaler",
            Step::RandomForest(_) => "random_forest",
        }
    }

    fn transform(&self, row: &mut [f64]) {
        match self {
            Step::SimpleImputer { statistics } => {
                for (x, fill) in row.iter_mut().zip(statistics) {
                    if x.is_nan() {
                        *x = *fill;
                    }
                }
            }
            Step::StandardScaler { mean, scale } => {
                for ((x, m), s) in row.iter_mut().zip(mean).zip(scale) {
                    let s = if *s == 0.0 { 1.0 } else { *s };
                    *x = (*x - m) / s;
                }
            }
            Step::RandomForest(_) => {}
        }
    }
}

/// Pipeline as it appears in the artifact, before structural checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawForestPipeline {
    /// Training dataframe columns, when the pipeline was fit on a dataframe
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_names_in: Option<Vec<String>>,
    pub steps: Vec<Step>,
}

/// Preprocessing steps followed by a random forest.
///
/// Only constructed through `TryFrom<RawForestPipeline>` (which serde also
/// goes through), so every instance has passed `validate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawForestPipeline")]
pub struct ForestPipeline {
    #[serde(skip_serializing_if = "Option::is_none")]
    feature_names_in: Option<Vec<String>>,
    steps: Vec<Step>,
}

impl TryFrom<RawForestPipeline> for ForestPipeline {
    type Error = String;

    fn try_from(raw: RawForestPipeline) -> Result<Self, Self::Error> {
        let pipeline = Self {
            feature_names_in: raw.feature_names_in,
            steps: raw.steps,
        };
        pipeline.validate()?;
        Ok(pipeline)
    }
}

impl ForestPipeline {
    /// Build a validated pipeline
    pub fn new(feature_names_in: Option<Vec<String>>, steps: Vec<Step>) -> Result<Self, String> {
        Self::try_from(RawForestPipeline {
            feature_names_in,
            steps,
        })
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// The terminal classifier, if the last step is one
    pub fn classifier(&self) -> Option<&RandomForest> {
        match self.steps.last() {
            Some(Step::RandomForest(forest)) => Some(forest),
            _ => None,
        }
    }

    /// Structural checks run once at construction, so tree walks never
    /// index out of bounds.
    fn validate(&self) -> Result<(), String> {
        let forest = self
            .classifier()
            .ok_or_else(|| "last step must be a random_forest classifier".to_string())?;
        let n_features = forest.n_features;

        for (i, step) in self.steps.iter().enumerate() {
            let widths: Vec<usize> = match step {
                Step::SimpleImputer { statistics } => vec![statistics.len()],
                Step::StandardScaler { mean, scale } => vec![mean.len(), scale.len()],
                Step::RandomForest(_) if i + 1 != self.steps.len() => {
                    return Err(format!("step {} is a classifier but is not the last step", i));
                }
                Step::RandomForest(_) => Vec::new(),
            };
            if widths.iter().any(|&w| w != n_features) {
                return Err(format!(
                    "step {} ({}) does not cover {} features",
                    i,
                    step.kind(),
                    n_features
                ));
            }
        }

        if let Some(names) = &self.feature_names_in {
            if names.len() != n_features {
                return Err(format!(
                    "feature_names_in lists {} columns, classifier expects {}",
                    names.len(),
                    n_features
                ));
            }
        }

        forest.validate()
    }

    pub fn n_trees(&self) -> usize {
        self.classifier().map(|f| f.trees.len()).unwrap_or(0)
    }
}

impl ScoringPipeline for ForestPipeline {
    fn name(&self) -> &str {
        "random_forest"
    }

    fn n_features(&self) -> usize {
        self.classifier().map(|f| f.n_features).unwrap_or(0)
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names_in.as_deref()
    }

    fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>, ScoringError> {
        if row.len() != self.n_features() {
            return Err(ScoringError::RowLength {
                found: row.len(),
                expected: self.n_features(),
            });
        }

        let mut x = row.to_vec();
        for step in &self.steps {
            match step {
                Step::RandomForest(forest) => return Ok(forest.predict_proba(&x)),
                _ => step.transform(&mut x),
            }
        }
        Err(ScoringError::Backend(
            "pipeline has no classifier step".to_string(),
        ))
    }
}
