//! Train and dev splits held by the orchestrator.

use crate::error::ModelError;

/// A labeled sample collection: row-major features plus zero-based labels.
#[derive(Debug, Clone)]
pub struct LabeledSplit {
    features: Vec<Vec<f64>>,
    labels: Vec<usize>,
}

impl LabeledSplit {
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ModelError::EmptySplit`] | no rows |
    /// | [`ModelError::LabelCountMismatch`] | `labels.len() != features.len()` |
    pub fn new(
        split: &'static str,
        features: Vec<Vec<f64>>,
        labels: Vec<usize>,
    ) -> Result<Self, ModelError> {
        if features.is_empty() {
            return Err(ModelError::EmptySplit { split });
        }
        if features.len() != labels.len() {
            return Err(ModelError::LabelCountMismatch {
                split,
                n_samples: features.len(),
                n_labels: labels.len(),
            });
        }
        Ok(Self { features, labels })
    }

    #[must_use]
    pub fn features(&self) -> &[Vec<f64>] {
        &self.features
    }

    #[must_use]
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.features.len()
    }

    /// Width of the first row.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.features.first().map_or(0, Vec::len)
    }

    /// Rows of `self` followed by rows of `other`.
    #[must_use]
    pub fn stack(&self, other: &LabeledSplit) -> LabeledSplit {
        let mut features = self.features.clone();
        features.extend_from_slice(&other.features);
        let mut labels = self.labels.clone();
        labels.extend_from_slice(&other.labels);
        LabeledSplit { features, labels }
    }
}

/// Disjoint train and dev splits of equal feature width.
#[derive(Debug, Clone)]
pub struct DataSplits {
    train: LabeledSplit,
    dev: LabeledSplit,
}

impl DataSplits {
    /// # Errors
    ///
    /// Returns [`ModelError::FeatureWidthMismatch`] if train and dev rows
    /// differ in width.
    pub fn new(train: LabeledSplit, dev: LabeledSplit) -> Result<Self, ModelError> {
        if train.n_features() != dev.n_features() {
            return Err(ModelError::FeatureWidthMismatch {
                train: train.n_features(),
                dev: dev.n_features(),
            });
        }
        Ok(Self { train, dev })
    }

    #[must_use]
    pub fn train(&self) -> &LabeledSplit {
        &self.train
    }

    #[must_use]
    pub fn dev(&self) -> &LabeledSplit {
        &self.dev
    }

    /// Number of classes seen in either split.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.train
            .labels
            .iter()
            .chain(&self.dev.labels)
            .max()
            .map_or(0, |&m| m + 1)
    }
}
