use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, instrument};

use crate::{
    RfError,
    node::{Node, NodeIndex},
    predict::argmax,
    split::{SplitContext, SplitCriterion},
};

/// Configuration for a single CART decision tree.
///
/// # Defaults
///
/// | Parameter           | Default               |
/// |---------------------|-----------------------|
/// | `criterion`         | `Gini`                |
/// | `max_depth`         | `None` (unlimited)    |
/// | `min_samples_split` | 2                     |
/// | `min_samples_leaf`  | 1                     |
/// | `max_features`      | `None` (all features) |
/// | `seed`              | 42                    |
#[derive(Debug, Clone)]
pub struct DecisionTreeConfig {
    pub(crate) criterion: SplitCriterion,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_split: usize,
    pub(crate) min_samples_leaf: usize,
    pub(crate) max_features: Option<usize>,
    pub(crate) seed: u64,
}

impl DecisionTreeConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            criterion: SplitCriterion::Gini,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
        }
    }

    #[must_use]
    pub fn with_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Limit depth to `d` levels below the root. `None` grows until leaves
    /// are pure or too small to split.
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

    /// Number of features drawn at each split. `None` means all of them.
    #[must_use]
    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Fit a tree with uniform sample weights.
    ///
    /// `features[sample_idx][feature_idx]` is row-major; labels are zero-based.
    ///
    /// # Errors
    ///
    /// See [`DecisionTreeConfig::fit_weighted`].
    pub fn fit(&self, features: &[Vec<f64>], labels: &[usize]) -> Result<DecisionTree, RfError> {
        let weights = vec![1.0; features.len()];
        self.fit_weighted(features, labels, &weights)
    }

    /// Fit a tree where `weights[i]` scales the contribution of sample `i`
    /// to impurities and leaf distributions.
    ///
    /// # Errors
    ///
    /// | Variant                              | When                                            |
    /// |--------------------------------------|-------------------------------------------------|
    /// | [`RfError::EmptyDataset`]            | `features` is empty                             |
    /// | [`RfError::LabelCountMismatch`]      | `labels` or `weights` length differs from rows  |
    /// | [`RfError::ZeroFeatures`]            | rows have zero feature columns                  |
    /// | [`RfError::FeatureCountMismatch`]    | rows have inconsistent lengths                  |
    /// | [`RfError::NonFiniteValue`]          | any value is NaN or infinite                    |
    /// | [`RfError::InvalidMaxFeatures`]      | `max_features` outside [1, n_features]          |
    /// | [`RfError::InvalidMaxDepth`]         | `max_depth` is `Some(0)`                        |
    /// | [`RfError::InvalidMinSamplesSplit`]  | `min_samples_split` < 2                         |
    /// | [`RfError::InvalidMinSamplesLeaf`]   | `min_samples_leaf` < 1                          |
    #[instrument(skip_all, fields(n_samples = features.len()))]
    pub fn fit_weighted(
        &self,
        features: &[Vec<f64>],
        labels: &[usize],
        weights: &[f64],
    ) -> Result<DecisionTree, RfError> {
        let n_features = crate::forest::validate_features(features, labels)?;
        if weights.len() != features.len() {
            return Err(RfError::LabelCountMismatch {
                n_samples: features.len(),
                n_labels: weights.len(),
            });
        }
        self.validate()?;
        let max_features = self.max_features.unwrap_or(n_features);
        if max_features == 0 || max_features > n_features {
            return Err(RfError::InvalidMaxFeatures {
                max_features,
                n_features,
            });
        }

        let n_classes = labels.iter().max().copied().unwrap_or(0) + 1;
        let columns = crate::forest::to_columns(features, n_features);
        let ctx = SplitContext {
            features: &columns,
            labels,
            weights,
            n_classes,
            criterion: self.criterion,
            max_features,
            min_samples_leaf: self.min_samples_leaf,
        };
        let sample_indices: Vec<usize> = (0..features.len()).collect();
        Ok(self.grow(&ctx, &sample_indices))
    }

    pub(crate) fn validate(&self) -> Result<(), RfError> {
        if self.max_depth == Some(0) {
            return Err(RfError::InvalidMaxDepth { max_depth: 0 });
        }
        if self.min_samples_split < 2 {
            return Err(RfError::InvalidMinSamplesSplit {
                min_samples_split: self.min_samples_split,
            });
        }
        if self.min_samples_leaf < 1 {
            return Err(RfError::InvalidMinSamplesLeaf {
                min_samples_leaf: self.min_samples_leaf,
            });
        }
        Ok(())
    }

    /// Grow a tree over pre-validated, column-major data.
    ///
    /// `sample_indices` may repeat an index; bootstrap draws rely on that.
    pub(crate) fn grow(&self, ctx: &SplitContext<'_>, sample_indices: &[usize]) -> DecisionTree {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut arena: Vec<Node> = Vec::new();
        build_node(ctx, self, sample_indices, 0, &mut rng, &mut arena);

        debug!(n_nodes = arena.len(), "decision tree built");

        DecisionTree {
            nodes: arena,
            n_features: ctx.features.len(),
            n_classes: ctx.n_classes,
        }
    }
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn build_node(
    ctx: &SplitContext<'_>,
    config: &DecisionTreeConfig,
    sample_indices: &[usize],
    depth: usize,
    rng: &mut ChaCha8Rng,
    arena: &mut Vec<Node>,
) -> NodeIndex {
    let n_samples = sample_indices.len();
    let totals = ctx.class_totals(sample_indices);
    let total_weight: f64 = totals.iter().sum();
    let impurity = ctx.criterion.impurity(&totals, total_weight);

    let depth_reached = config.max_depth.is_some_and(|max_d| depth >= max_d);
    let split = if depth_reached || n_samples < config.min_samples_split || impurity.is_pure() {
        None
    } else {
        ctx.find_best_split(sample_indices, rng)
    };

    let Some(split) = split else {
        let distribution = if total_weight > 0.0 {
            totals.iter().map(|&w| w / total_weight).collect()
        } else {
            vec![1.0 / ctx.n_classes as f64; ctx.n_classes]
        };
        let idx = arena.len();
        arena.push(Node::Leaf {
            prediction: argmax(&distribution),
            distribution,
            impurity,
            n_samples,
        });
        return NodeIndex::new(idx);
    };

    // Reserve the slot so children get higher indices, then patch it.
    let node_idx = arena.len();
    arena.push(Node::Leaf {
        prediction: 0,
        distribution: Vec::new(),
        impurity,
        n_samples,
    });
    let left = build_node(ctx, config, &split.left_indices, depth + 1, rng, arena);
    let right = build_node(ctx, config, &split.right_indices, depth + 1, rng, arena);
    arena[node_idx] = Node::Split {
        feature: split.feature,
        threshold: split.threshold,
        left,
        right,
        impurity,
        n_samples,
    };
    NodeIndex::new(node_idx)
}

/// A fitted CART decision tree stored as a node arena rooted at index 0.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DecisionTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) n_features: usize,
    pub(crate) n_classes: usize,
}

impl DecisionTree {
    /// Predict the class label for a single sample.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn predict(&self, sample: &[f64]) -> Result<usize, RfError> {
        self.check_width(sample)?;
        match self.leaf(sample) {
            Node::Leaf { prediction, .. } => Ok(*prediction),
            Node::Split { .. } => unreachable!("leaf() always ends at a leaf"),
        }
    }

    /// Return the class distribution of the leaf `sample` falls into.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn predict_proba(&self, sample: &[f64]) -> Result<&[f64], RfError> {
        self.check_width(sample)?;
        match self.leaf(sample) {
            Node::Leaf { distribution, .. } => Ok(distribution),
            Node::Split { .. } => unreachable!("leaf() always ends at a leaf"),
        }
    }

    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Depth of the deepest leaf; a lone root leaf has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut max_depth = 0usize;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, d)) = stack.pop() {
            match &self.nodes[idx] {
                Node::Leaf { .. } => max_depth = max_depth.max(d),
                Node::Split { left, right, .. } => {
                    stack.push((left.index(), d + 1));
                    stack.push((right.index(), d + 1));
                }
            }
        }
        max_depth
    }

    fn check_width(&self, sample: &[f64]) -> Result<(), RfError> {
        if sample.len() != self.n_features {
            return Err(RfError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        Ok(())
    }

    fn leaf(&self, sample: &[f64]) -> &Node {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                node @ Node::Leaf { .. } => return node,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if sample[feature.index()] <= *threshold {
                        left.index()
                    } else {
                        right.index()
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<Vec<f64>>, Vec<usize>) {
        let features = vec![
            vec![1.0, 0.0],
            vec![2.0, 0.0],
            vec![3.0, 0.0],
            vec![10.0, 0.0],
            vec![11.0, 0.0],
            vec![12.0, 0.0],
        ];
        (features, vec![0, 0, 0, 1, 1, 1])
    }

    #[test]
    fn pure_dataset_single_leaf() {
        let features = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        let tree = DecisionTreeConfig::new().fit(&features, &[0, 0, 0]).unwrap();
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.n_leaves(), 1);
        assert_eq!(tree.predict(&[2.0, 3.0]).unwrap(), 0);
    }

    #[test]
    fn linearly_separable_correct_split() {
        let (features, labels) = separable();
        let tree = DecisionTreeConfig::new()
            .with_criterion(SplitCriterion::Entropy)
            .fit(&features, &labels)
            .unwrap();
        assert_eq!(tree.predict(&[2.0, 0.0]).unwrap(), 0);
        assert_eq!(tree.predict(&[11.0, 0.0]).unwrap(), 1);
    }

    #[test]
    fn xor_needs_depth_two_and_max_depth_caps_it() {
        let features = vec![
            vec![0.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
        ];
        let labels = vec![0, 1, 1, 0];
        let full = DecisionTreeConfig::new().fit(&features, &labels).unwrap();
        assert!(full.depth() >= 2);

        let capped = DecisionTreeConfig::new()
            .with_max_depth(Some(1))
            .fit(&features, &labels)
            .unwrap();
        assert!(capped.depth() <= 1);
    }

    #[test]
    fn weighted_leaf_distribution() {
        // One constant feature, so the root stays a leaf.
        let features = vec![vec![1.0], vec![1.0], vec![1.0], vec![1.0]];
        let labels = vec![0, 0, 0, 1];
        let tree = DecisionTreeConfig::new()
            .fit_weighted(&features, &labels, &[1.0, 1.0, 1.0, 3.0])
            .unwrap();
        let proba = tree.predict_proba(&[1.0]).unwrap();
        assert!((proba[0] - 0.5).abs() < 1e-12);
        assert!((proba[1] - 0.5).abs() < 1e-12);
        // Ties resolve to the lowest class index.
        assert_eq!(tree.predict(&[1.0]).unwrap(), 0);
    }

    #[test]
    fn predict_proba_sums_to_one() {
        let (features, labels) = separable();
        let tree = DecisionTreeConfig::new().fit(&features, &labels).unwrap();
        let sum: f64 = tree.predict_proba(&[5.0, 0.0]).unwrap().iter().sum();
        assert!((sum - 1.0).abs() < 1e-10);
    }

    #[test]
    fn prediction_feature_mismatch() {
        let (features, labels) = separable();
        let tree = DecisionTreeConfig::new().fit(&features, &labels).unwrap();
        let err = tree.predict(&[1.0]).unwrap_err();
        assert!(matches!(
            err,
            RfError::PredictionFeatureMismatch { expected: 2, got: 1 }
        ));
    }

    #[test]
    fn input_validation_errors() {
        let err = DecisionTreeConfig::new().fit(&[], &[]).unwrap_err();
        assert!(matches!(err, RfError::EmptyDataset));

        let ragged = vec![vec![1.0, 2.0], vec![3.0]];
        let err = DecisionTreeConfig::new().fit(&ragged, &[0, 1]).unwrap_err();
        assert!(matches!(err, RfError::FeatureCountMismatch { .. }));

        let nan = vec![vec![1.0, f64::NAN], vec![3.0, 4.0]];
        let err = DecisionTreeConfig::new().fit(&nan, &[0, 1]).unwrap_err();
        assert!(matches!(err, RfError::NonFiniteValue { .. }));

        let (features, labels) = separable();
        let err = DecisionTreeConfig::new()
            .with_max_depth(Some(0))
            .fit(&features, &labels)
            .unwrap_err();
        assert!(matches!(err, RfError::InvalidMaxDepth { .. }));
    }
}
