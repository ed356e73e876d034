//! Stratified k-fold cross-validation for Random Forest.

use std::fmt;

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, instrument, warn};

use crate::config::RandomForestConfig;
use crate::confusion::ConfusionMatrix;
use crate::error::RfError;

/// Metric used to score each held-out fold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scoring {
    Accuracy,
    /// Unweighted mean of per-class recall.
    MacroRecall,
}

impl Scoring {
    /// Score a confusion matrix with this metric.
    #[must_use]
    pub fn score(self, matrix: &ConfusionMatrix) -> f64 {
        match self {
            Scoring::Accuracy => matrix.accuracy(),
            Scoring::MacroRecall => matrix.macro_recall(),
        }
    }
}

impl fmt::Display for Scoring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scoring::Accuracy => f.write_str("accuracy"),
            Scoring::MacroRecall => f.write_str("recall_macro"),
        }
    }
}

/// Cross-validation configuration.
///
/// Construct via [`CrossValidation::new`], then chain `with_*` methods.
#[derive(Debug, Clone)]
pub struct CrossValidation {
    n_folds: usize,
    seed: u64,
    scoring: Scoring,
}

/// Results of stratified k-fold cross-validation.
#[derive(Debug, Clone)]
pub struct CrossValidationResult {
    /// Score of each held-out fold.
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
    /// Population standard deviation of `fold_scores`.
    pub std_score: f64,
    /// Summed over all folds.
    pub confusion_matrix: ConfusionMatrix,
    pub scoring: Scoring,
    pub n_folds: usize,
    pub n_samples: usize,
    pub n_classes: usize,
}

impl CrossValidation {
    /// Create a new cross-validation config with the given number of folds.
    ///
    /// Folds are scored by accuracy unless [`CrossValidation::with_scoring`]
    /// says otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::InvalidFoldCount`] if `n_folds` < 2.
    pub fn new(n_folds: usize) -> Result<Self, RfError> {
        if n_folds < 2 {
            return Err(RfError::InvalidFoldCount { n_folds });
        }
        Ok(Self {
            n_folds,
            seed: 42,
            scoring: Scoring::Accuracy,
        })
    }

    /// Set the random seed for fold shuffling.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_scoring(mut self, scoring: Scoring) -> Self {
        self.scoring = scoring;
        self
    }

    #[must_use]
    pub fn n_folds(&self) -> usize {
        self.n_folds
    }

    /// Run stratified k-fold cross-validation.
    ///
    /// Each fold trains a forest on the remaining folds (with the fold
    /// number added to the config seed) and scores it on the held-out fold.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::EmptyDataset`] | Zero samples |
    /// | [`RfError::LabelCountMismatch`] | `labels.len() != features.len()` |
    /// | [`RfError::TooFewSamplesForFolds`] | Every class has fewer samples than folds |
    /// | Other RF errors | From underlying training |
    #[instrument(skip_all, fields(n_folds = self.n_folds, n_samples = features.len(), scoring = %self.scoring))]
    pub fn evaluate(
        &self,
        config: &RandomForestConfig,
        features: &[Vec<f64>],
        labels: &[usize],
        feature_names: &[String],
    ) -> Result<CrossValidationResult, RfError> {
        if features.is_empty() {
            return Err(RfError::EmptyDataset);
        }
        if labels.len() != features.len() {
            return Err(RfError::LabelCountMismatch {
                n_samples: features.len(),
                n_labels: labels.len(),
            });
        }

        let n_samples = features.len();
        let n_classes = labels.iter().max().copied().unwrap_or(0) + 1;
        let fold_assignments = self.stratified_split(labels, n_classes)?;

        let mut fold_scores = Vec::with_capacity(self.n_folds);
        let mut all_true = Vec::with_capacity(n_samples);
        let mut all_predicted = Vec::with_capacity(n_samples);

        for fold in 0..self.n_folds {
            let mut train_features = Vec::new();
            let mut train_labels = Vec::new();
            let mut test_features = Vec::new();
            let mut test_labels = Vec::new();

            for (i, &assigned) in fold_assignments.iter().enumerate() {
                if assigned == fold {
                    test_features.push(features[i].clone());
                    test_labels.push(labels[i]);
                } else {
                    train_features.push(features[i].clone());
                    train_labels.push(labels[i]);
                }
            }

            let fold_config = config.clone().with_seed(config.seed.wrapping_add(fold as u64));
            let forest = fold_config
                .fit(&train_features, &train_labels, feature_names)?
                .into_forest();
            let predictions = forest.predict_batch(&test_features)?;

            let fold_matrix = ConfusionMatrix::from_labels(&test_labels, &predictions, n_classes)?;
            let score = self.scoring.score(&fold_matrix);
            fold_scores.push(score);
            debug!(fold, score, "fold completed");

            all_true.extend_from_slice(&test_labels);
            all_predicted.extend_from_slice(&predictions);
        }

        let (mean_score, std_score) = mean_and_std(&fold_scores);
        let confusion_matrix = ConfusionMatrix::from_labels(&all_true, &all_predicted, n_classes)?;

        Ok(CrossValidationResult {
            fold_scores,
            mean_score,
            std_score,
            confusion_matrix,
            scoring: self.scoring,
            n_folds: self.n_folds,
            n_samples,
            n_classes,
        })
    }

    /// Assign each sample to a fold.
    ///
    /// Samples are grouped by class and shuffled within each class. Each
    /// class is then dealt round-robin across the folds, so every fold gets
    /// about the same share of every class. A class smaller than the fold
    /// count only reaches the first folds.
    fn stratified_split(&self, labels: &[usize], n_classes: usize) -> Result<Vec<usize>, RfError> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let mut class_indices: Vec<Vec<usize>> = vec![vec![]; n_classes];
        for (i, &label) in labels.iter().enumerate() {
            class_indices[label].push(i);
        }

        let (largest, largest_count) = class_indices
            .iter()
            .enumerate()
            .map(|(class, indices)| (class, indices.len()))
            .fold((0, 0), |best, cur| if cur.1 > best.1 { cur } else { best });
        if largest_count < self.n_folds {
            return Err(RfError::TooFewSamplesForFolds {
                class: largest,
                count: largest_count,
                n_folds: self.n_folds,
            });
        }
        for (class, indices) in class_indices.iter().enumerate() {
            if !indices.is_empty() && indices.len() < self.n_folds {
                warn!(
                    class,
                    count = indices.len(),
                    n_folds = self.n_folds,
                    "class has fewer samples than folds; it is spread over the first folds"
                );
            }
        }

        let mut fold_assignments = vec![0usize; labels.len()];
        for indices in &mut class_indices {
            indices.shuffle(&mut rng);
            for (j, &idx) in indices.iter().enumerate() {
                fold_assignments[idx] = j % self.n_folds;
            }
        }

        Ok(fold_assignments)
    }
}

/// Mean and population standard deviation; `(0.0, 0.0)` for no values.
#[must_use]
pub fn mean_and_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}
