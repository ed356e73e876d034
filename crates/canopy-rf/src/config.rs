//! Configuration builder for Random Forest training.

use crate::error::RfError;
use crate::result::RandomForestResult;
use crate::split::SplitCriterion;

/// Strategy for determining the number of features to consider at each split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaxFeatures {
    /// Square root of total features.
    Sqrt,
    /// Log base 2 of total features.
    Log2,
    /// A fraction of total features (must be in (0.0, 1.0]).
    Fraction(f64),
    /// A fixed count.
    Fixed(usize),
    /// All features (no subsampling).
    All,
}

impl MaxFeatures {
    /// Resolve to a concrete feature count for `n_features` columns.
    ///
    /// Fractions round down, with a floor of one feature.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::InvalidMaxFeaturesFraction`] | fraction outside (0.0, 1.0] |
    /// | [`RfError::InvalidMaxFeatures`] | resolved count outside [1, n_features] |
    pub fn resolve(self, n_features: usize) -> Result<usize, RfError> {
        let n = n_features as f64;
        let resolved = match self {
            MaxFeatures::Sqrt => n.sqrt().floor().max(1.0) as usize,
            MaxFeatures::Log2 => n.log2().floor().max(1.0) as usize,
            MaxFeatures::Fraction(f) => {
                if !(f > 0.0 && f <= 1.0) {
                    return Err(RfError::InvalidMaxFeaturesFraction { fraction: f });
                }
                (n * f).floor().max(1.0) as usize
            }
            MaxFeatures::Fixed(count) => count,
            MaxFeatures::All => n_features,
        };
        if resolved == 0 || resolved > n_features {
            return Err(RfError::InvalidMaxFeatures {
                max_features: resolved,
                n_features,
            });
        }
        Ok(resolved)
    }
}

/// How samples are weighted by class during tree induction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassWeight {
    /// Every sample counts once.
    Uniform,
    /// Each class gets weight `n_samples / (n_classes * class_count)`, so
    /// every class carries the same total weight.
    Balanced,
}

impl ClassWeight {
    /// Per-class weights for the given training labels.
    ///
    /// Classes absent from `labels` get weight zero.
    #[must_use]
    pub fn class_weights(self, labels: &[usize], n_classes: usize) -> Vec<f64> {
        match self {
            ClassWeight::Uniform => vec![1.0; n_classes],
            ClassWeight::Balanced => {
                let mut counts = vec![0usize; n_classes];
                for &label in labels {
                    counts[label] += 1;
                }
                let present = counts.iter().filter(|&&c| c > 0).count().max(1);
                let n = labels.len() as f64;
                counts
                    .iter()
                    .map(|&c| {
                        if c == 0 {
                            0.0
                        } else {
                            n / (present as f64 * c as f64)
                        }
                    })
                    .collect()
            }
        }
    }
}

/// Configuration for Random Forest training.
///
/// Construct via [`RandomForestConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter            | Default     |
/// |----------------------|-------------|
/// | `max_features`       | `Sqrt`      |
/// | `max_depth`          | `None`      |
/// | `min_samples_split`  | 2           |
/// | `min_samples_leaf`   | 1           |
/// | `criterion`          | `Gini`      |
/// | `class_weight`       | `Uniform`   |
/// | `seed`               | 42          |
/// | `bootstrap_fraction` | 1.0         |
#[derive(Debug, Clone)]
pub struct RandomForestConfig {
    pub(crate) n_trees: usize,
    pub(crate) max_features: MaxFeatures,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_split: usize,
    pub(crate) min_samples_leaf: usize,
    pub(crate) criterion: SplitCriterion,
    pub(crate) class_weight: ClassWeight,
    pub(crate) seed: u64,
    pub(crate) bootstrap_fraction: f64,
}

impl RandomForestConfig {
    /// Create a new config with the given number of trees.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::InvalidTreeCount`] if `n_trees` is zero.
    pub fn new(n_trees: usize) -> Result<Self, RfError> {
        if n_trees == 0 {
            return Err(RfError::InvalidTreeCount { n_trees });
        }
        Ok(Self {
            n_trees,
            max_features: MaxFeatures::Sqrt,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            criterion: SplitCriterion::Gini,
            class_weight: ClassWeight::Uniform,
            seed: 42,
            bootstrap_fraction: 1.0,
        })
    }

    // --- Setters ---

    #[must_use]
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set the maximum tree depth. `None` means unlimited.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    #[must_use]
    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    #[must_use]
    pub fn with_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    #[must_use]
    pub fn with_class_weight(mut self, class_weight: ClassWeight) -> Self {
        self.class_weight = class_weight;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the bootstrap fraction (proportion of samples drawn per tree).
    #[must_use]
    pub fn with_bootstrap_fraction(mut self, bootstrap_fraction: f64) -> Self {
        self.bootstrap_fraction = bootstrap_fraction;
        self
    }

    // --- Getters ---

    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    #[must_use]
    pub fn max_features(&self) -> MaxFeatures {
        self.max_features
    }

    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    #[must_use]
    pub fn criterion(&self) -> SplitCriterion {
        self.criterion
    }

    #[must_use]
    pub fn class_weight(&self) -> ClassWeight {
        self.class_weight
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Train a Random Forest on the provided dataset.
    ///
    /// `features[sample_idx][feature_idx]`: row-major layout.
    /// `labels[sample_idx]`: class labels (zero-based).
    /// `feature_names`: names for each feature column; may be empty.
    ///
    /// # Errors
    ///
    /// | Variant                               | When                                              |
    /// |---------------------------------------|---------------------------------------------------|
    /// | [`RfError::EmptyDataset`]             | `features` is empty                               |
    /// | [`RfError::LabelCountMismatch`]       | `labels.len() != features.len()`                  |
    /// | [`RfError::ZeroFeatures`]             | rows have zero feature columns                    |
    /// | [`RfError::FeatureCountMismatch`]     | rows have inconsistent lengths                    |
    /// | [`RfError::NonFiniteValue`]           | any value is NaN or infinite                      |
    /// | [`RfError::InvalidMaxFeatures`]       | resolved max_features is outside [1, n_features]  |
    /// | [`RfError::InvalidMaxDepth`]          | `max_depth` is `Some(0)`                          |
    /// | [`RfError::InvalidBootstrapFraction`] | bootstrap_fraction is not in (0.0, 1.0]           |
    pub fn fit(
        &self,
        features: &[Vec<f64>],
        labels: &[usize],
        feature_names: &[String],
    ) -> Result<RandomForestResult, RfError> {
        crate::forest::train(self, features, labels, feature_names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_rounds_down_with_floor_of_one() {
        assert_eq!(MaxFeatures::Fraction(0.1).resolve(25).unwrap(), 2);
        assert_eq!(MaxFeatures::Fraction(0.1).resolve(5).unwrap(), 1);
        assert_eq!(MaxFeatures::Fraction(1.0).resolve(7).unwrap(), 7);
    }

    #[test]
    fn invalid_fraction_rejected() {
        assert!(matches!(
            MaxFeatures::Fraction(0.0).resolve(10),
            Err(RfError::InvalidMaxFeaturesFraction { .. })
        ));
        assert!(matches!(
            MaxFeatures::Fraction(1.5).resolve(10),
            Err(RfError::InvalidMaxFeaturesFraction { .. })
        ));
    }

    #[test]
    fn fixed_count_beyond_width_rejected() {
        assert!(matches!(
            MaxFeatures::Fixed(11).resolve(10),
            Err(RfError::InvalidMaxFeatures { max_features: 11, n_features: 10 })
        ));
    }

    #[test]
    fn sqrt_and_log2() {
        assert_eq!(MaxFeatures::Sqrt.resolve(16).unwrap(), 4);
        assert_eq!(MaxFeatures::Log2.resolve(16).unwrap(), 4);
        assert_eq!(MaxFeatures::Sqrt.resolve(1).unwrap(), 1);
    }

    #[test]
    fn balanced_weights_equalise_class_mass() {
        let labels = vec![0, 0, 0, 0, 0, 0, 1, 1];
        let w = ClassWeight::Balanced.class_weights(&labels, 2);
        // 8 / (2 * 6) and 8 / (2 * 2)
        assert!((w[0] - 8.0 / 12.0).abs() < 1e-12);
        assert!((w[1] - 2.0).abs() < 1e-12);
        assert!((w[0] * 6.0 - w[1] * 2.0).abs() < 1e-12);
    }

    #[test]
    fn balanced_weights_skip_absent_classes() {
        let w = ClassWeight::Balanced.class_weights(&[0, 0, 2, 2], 3);
        assert!((w[0] - 1.0).abs() < 1e-12);
        assert_eq!(w[1], 0.0);
        assert!((w[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn uniform_weights_are_one() {
        assert_eq!(ClassWeight::Uniform.class_weights(&[0, 1, 1], 2), vec![1.0, 1.0]);
    }

    #[test]
    fn zero_trees_rejected() {
        assert!(matches!(
            RandomForestConfig::new(0),
            Err(RfError::InvalidTreeCount { n_trees: 0 })
        ));
    }
}
