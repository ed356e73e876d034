use std::fmt;
use std::str::FromStr;

use rand::Rng;

use crate::node::{FeatureIndex, Impurity};

/// Criterion for measuring the quality of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitCriterion {
    /// Gini impurity: 1 - Σ(p_i²)
    Gini,
    /// Information entropy: -Σ(p_i · ln(p_i))
    Entropy,
}

impl SplitCriterion {
    /// Compute the impurity of a node from its weighted class totals.
    ///
    /// `class_weights[c]` is the summed sample weight of class `c` at the
    /// node, `total` their sum. Returns zero for an empty node.
    #[must_use]
    pub fn impurity(&self, class_weights: &[f64], total: f64) -> Impurity {
        if total <= 0.0 {
            return Impurity::new(0.0);
        }
        let value = match self {
            SplitCriterion::Gini => {
                let sum_sq: f64 = class_weights
                    .iter()
                    .map(|&w| {
                        let p = w / total;
                        p * p
                    })
                    .sum();
                1.0 - sum_sq
            }
            SplitCriterion::Entropy => -class_weights
                .iter()
                .filter(|&&w| w > 0.0)
                .map(|&w| {
                    let p = w / total;
                    p * p.ln()
                })
                .sum::<f64>(),
        };
        Impurity::new(value.max(0.0))
    }
}

impl fmt::Display for SplitCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitCriterion::Gini => f.write_str("gini"),
            SplitCriterion::Entropy => f.write_str("entropy"),
        }
    }
}

impl FromStr for SplitCriterion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gini" => Ok(SplitCriterion::Gini),
            "entropy" => Ok(SplitCriterion::Entropy),
            other => Err(format!("unknown split criterion: {other} (expected gini or entropy)")),
        }
    }
}

/// Best split found for a node.
#[derive(Debug, Clone)]
pub(crate) struct SplitResult {
    pub(crate) feature: FeatureIndex,
    pub(crate) threshold: f64,
    pub(crate) left_indices: Vec<usize>,
    pub(crate) right_indices: Vec<usize>,
}

/// Inputs shared by every split search inside one tree.
pub(crate) struct SplitContext<'a> {
    /// Column-major: `features[feature_idx][sample_idx]`.
    pub(crate) features: &'a [Vec<f64>],
    pub(crate) labels: &'a [usize],
    /// Per-sample weight, indexed like `labels`.
    pub(crate) weights: &'a [f64],
    pub(crate) n_classes: usize,
    pub(crate) criterion: SplitCriterion,
    pub(crate) max_features: usize,
    pub(crate) min_samples_leaf: usize,
}

impl SplitContext<'_> {
    /// Summed sample weight per class over `sample_indices`.
    pub(crate) fn class_totals(&self, sample_indices: &[usize]) -> Vec<f64> {
        let mut totals = vec![0.0f64; self.n_classes];
        for &si in sample_indices {
            totals[self.labels[si]] += self.weights[si];
        }
        totals
    }

    /// Find the best split among `max_features` randomly drawn features.
    ///
    /// Each candidate feature is sorted once and scanned left to right with
    /// incremental weighted class totals. The split maximising the weighted
    /// impurity decrease wins. If none of the first `max_features` draws
    /// yields a valid boundary, drawing continues until one does. Returns
    /// `None` when every feature is constant over the node or
    /// `min_samples_leaf` rules out every boundary.
    pub(crate) fn find_best_split(
        &self,
        sample_indices: &[usize],
        rng: &mut impl Rng,
    ) -> Option<SplitResult> {
        let n_features = self.features.len();
        let n_samples = sample_indices.len();
        if n_samples < 2 || n_features == 0 {
            return None;
        }

        let parent_totals = self.class_totals(sample_indices);
        let parent_weight: f64 = parent_totals.iter().sum();
        let parent_impurity = self.criterion.impurity(&parent_totals, parent_weight);

        let mut feature_order: Vec<usize> = (0..n_features).collect();
        let take = self.max_features.min(n_features);

        let mut best_decrease = f64::NEG_INFINITY;
        let mut best: Option<(FeatureIndex, f64)> = None;
        let mut sorted: Vec<(f64, usize)> = Vec::with_capacity(n_samples);

        for drawn in 0..n_features {
            if drawn >= take && best.is_some() {
                break;
            }
            // Lazy Fisher-Yates over the feature order.
            let j = rng.gen_range(drawn..n_features);
            feature_order.swap(drawn, j);
            let feat_idx = feature_order[drawn];

            let column = &self.features[feat_idx];
            sorted.clear();
            sorted.extend(sample_indices.iter().map(|&si| (column[si], si)));
            sorted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_totals = vec![0.0f64; self.n_classes];
            let mut right_totals = parent_totals.clone();
            let mut left_weight = 0.0f64;

            for i in 0..(n_samples - 1) {
                let (value, si) = sorted[i];
                let w = self.weights[si];
                left_totals[self.labels[si]] += w;
                right_totals[self.labels[si]] -= w;
                left_weight += w;

                let next_value = sorted[i + 1].0;
                if value == next_value {
                    continue;
                }

                let n_left = i + 1;
                let n_right = n_samples - n_left;
                if n_left < self.min_samples_leaf || n_right < self.min_samples_leaf {
                    continue;
                }

                let right_weight = parent_weight - left_weight;
                let left_impurity = self.criterion.impurity(&left_totals, left_weight);
                let right_impurity = self.criterion.impurity(&right_totals, right_weight);

                let decrease = parent_weight * parent_impurity.value()
                    - left_weight * left_impurity.value()
                    - right_weight * right_impurity.value();

                if decrease > best_decrease {
                    best_decrease = decrease;
                    best = Some((FeatureIndex::new(feat_idx), (value + next_value) / 2.0));
                }
            }
        }

        let (feature, threshold) = best?;
        let column = &self.features[feature.index()];
        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = sample_indices
            .iter()
            .partition(|&&si| column[si] <= threshold);

        Some(SplitResult {
            feature,
            threshold,
            left_indices,
            right_indices,
        })
    }
}
