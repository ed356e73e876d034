//! Hyperparameter tuning: cross-validated grid search and dev-set search.
//!
//! Both strategies score candidates by macro-averaged recall and pick the
//! highest score, with the earliest candidate in grid order winning ties.

use canopy_rf::{ClassWeight, CrossValidation, Scoring, mean_and_std, recall_macro};
use tracing::{debug, info, instrument};

use crate::data::LabeledSplit;
use crate::error::ModelError;
use crate::params::Hyperparameters;
use crate::search::SearchSpace;

/// Index of the first maximum; `None` for an empty slice.
pub(crate) fn first_max(scores: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &score) in scores.iter().enumerate() {
        match best {
            Some(b) if score <= scores[b] => {}
            _ => best = Some(i),
        }
    }
    best
}

/// Exhaustive grid search scored by stratified k-fold cross-validation over
/// train and dev stacked together. Forests are unweighted.
#[derive(Debug, Clone)]
pub struct GridSearch {
    n_folds: usize,
    seed: u64,
}

/// Outcome of a [`GridSearch`].
#[derive(Debug, Clone)]
pub struct GridSearchResult {
    /// Grid points in evaluation order.
    pub candidates: Vec<Hyperparameters>,
    pub mean_scores: Vec<f64>,
    pub std_scores: Vec<f64>,
    pub best_index: usize,
    pub best: Hyperparameters,
    /// Macro recall on dev of the winner refit on the stacked data.
    pub dev_score: f64,
}

impl Default for GridSearch {
    fn default() -> Self {
        Self {
            n_folds: 5,
            seed: 42,
        }
    }
}

impl GridSearch {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_n_folds(mut self, n_folds: usize) -> Self {
        self.n_folds = n_folds;
        self
    }

    #[must_use]
    pub fn n_folds(&self) -> usize {
        self.n_folds
    }

    /// Run the search.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ModelError::EmptySearchSpace`] | the grid has no points |
    /// | [`ModelError::Forest`] | fold count invalid, a class too small for the folds, or training failed |
    #[instrument(skip_all, fields(n_candidates = space.len(), n_folds = self.n_folds))]
    pub fn run(
        &self,
        space: &SearchSpace,
        train: &LabeledSplit,
        dev: &LabeledSplit,
    ) -> Result<GridSearchResult, ModelError> {
        let candidates = space.candidates();
        if candidates.is_empty() {
            return Err(ModelError::EmptySearchSpace);
        }
        info!("running the grid search for the Random Forest classifier");

        let stacked = train.stack(dev);
        let cv = CrossValidation::new(self.n_folds)?
            .with_seed(self.seed)
            .with_scoring(Scoring::MacroRecall);

        let mut mean_scores = Vec::with_capacity(candidates.len());
        let mut std_scores = Vec::with_capacity(candidates.len());
        for (index, params) in candidates.iter().enumerate() {
            let config = params.to_forest_config(ClassWeight::Uniform, self.seed)?;
            let result = cv.evaluate(&config, stacked.features(), stacked.labels(), &[])?;
            info!(
                candidate = index,
                %params,
                mean = result.mean_score,
                std = result.std_score,
                "cross-validated macro recall"
            );
            mean_scores.push(result.mean_score);
            std_scores.push(result.std_score);
        }

        let best_index = first_max(&mean_scores).ok_or(ModelError::EmptySearchSpace)?;
        let best = candidates[best_index].clone();

        let forest = best
            .to_forest_config(ClassWeight::Uniform, self.seed)?
            .fit(stacked.features(), stacked.labels(), &[])?
            .into_forest();
        let predictions = forest.predict_batch(dev.features())?;
        let dev_score = recall_macro(dev.labels(), &predictions)?;

        info!(best = %best, best_index, dev_score, "grid search finished");
        Ok(GridSearchResult {
            candidates,
            mean_scores,
            std_scores,
            best_index,
            best,
            dev_score,
        })
    }
}

/// Search that fits class-balanced forests on train several times per
/// candidate and averages their macro recall on dev.
#[derive(Debug, Clone)]
pub struct DevSearch {
    repeats: usize,
    seed: u64,
}

/// Outcome of a [`DevSearch`].
#[derive(Debug, Clone)]
pub struct DevSearchResult {
    pub candidates: Vec<Hyperparameters>,
    /// `recalls[candidate][repeat]`.
    pub recalls: Vec<Vec<f64>>,
    pub averages: Vec<f64>,
    pub best_index: usize,
    pub best: Hyperparameters,
}

impl Default for DevSearch {
    fn default() -> Self {
        Self {
            repeats: 5,
            seed: 42,
        }
    }
}

impl DevSearch {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// Fits per candidate; clamped to at least one.
    #[must_use]
    pub fn with_repeats(mut self, repeats: usize) -> Self {
        self.repeats = repeats.max(1);
        self
    }

    #[must_use]
    pub fn repeats(&self) -> usize {
        self.repeats
    }

    /// Run the search. Repeat `j` of every candidate uses seed `seed + j`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ModelError::EmptySearchSpace`] | the grid has no points |
    /// | [`ModelError::Forest`] | training or prediction failed |
    #[instrument(skip_all, fields(n_candidates = space.len(), repeats = self.repeats))]
    pub fn run(
        &self,
        space: &SearchSpace,
        train: &LabeledSplit,
        dev: &LabeledSplit,
    ) -> Result<DevSearchResult, ModelError> {
        let candidates = space.candidates();
        if candidates.is_empty() {
            return Err(ModelError::EmptySearchSpace);
        }
        info!("running the validation on the development set");

        let mut recalls = Vec::with_capacity(candidates.len());
        let mut averages = Vec::with_capacity(candidates.len());
        for (index, params) in candidates.iter().enumerate() {
            let mut scores = Vec::with_capacity(self.repeats);
            for repeat in 0..self.repeats {
                let seed = self.seed.wrapping_add(repeat as u64);
                let forest = params
                    .to_forest_config(ClassWeight::Balanced, seed)?
                    .fit(train.features(), train.labels(), &[])?
                    .into_forest();
                let predictions = forest.predict_batch(dev.features())?;
                let recall = recall_macro(dev.labels(), &predictions)?;
                info!(
                    candidate = index,
                    repeat,
                    recall = %format!("{recall:.3}"),
                    "dev recall for this hyperparameter setting"
                );
                scores.push(recall);
            }
            let (average, _) = mean_and_std(&scores);
            debug!(candidate = index, %params, average, "candidate averaged");
            averages.push(average);
            recalls.push(scores);
        }

        let best_index = first_max(&averages).ok_or(ModelError::EmptySearchSpace)?;
        let best = candidates[best_index].clone();
        info!(best = %best, best_index, average = averages[best_index], "dev search finished");

        Ok(DevSearchResult {
            candidates,
            recalls,
            averages,
            best_index,
            best,
        })
    }
}

#[cfg(test)]
mod tests {
    use canopy_rf::SplitCriterion;

    use super::*;
    use crate::params::MaxFeaturesParam;

    fn separable(n_per_class: usize, offset: f64) -> LabeledSplit {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for class in 0..2 {
            for i in 0..n_per_class {
                let x = class as f64 * 10.0 + offset + i as f64 * 0.1;
                features.push(vec![x, 1.0]);
                labels.push(class);
            }
        }
        LabeledSplit::new("train", features, labels).unwrap()
    }

    fn space(n_estimators: Vec<usize>, max_depth: Vec<usize>) -> SearchSpace {
        SearchSpace {
            n_estimators,
            max_features: vec![MaxFeaturesParam::Count(1)],
            max_depth: max_depth.into_iter().map(Some).collect(),
            criterion: vec![SplitCriterion::Entropy],
        }
    }

    #[test]
    fn first_max_prefers_earliest() {
        assert_eq!(first_max(&[0.5, 0.9, 0.9, 0.1]), Some(1));
        assert_eq!(first_max(&[0.7]), Some(0));
        assert_eq!(first_max(&[]), None);
    }

    #[test]
    fn empty_space_is_an_error() {
        let train = separable(10, 0.0);
        let dev = separable(3, 0.05);
        let empty = space(vec![], vec![3]);
        assert!(matches!(
            DevSearch::default().run(&empty, &train, &dev),
            Err(ModelError::EmptySearchSpace)
        ));
        assert!(matches!(
            GridSearch::default().run(&empty, &train, &dev),
            Err(ModelError::EmptySearchSpace)
        ));
    }

    #[test]
    fn dev_search_ties_go_to_first_candidate() {
        // Every candidate separates the classes perfectly, so all average 1.0.
        let train = separable(10, 0.0);
        let dev = separable(3, 0.05);
        let result = DevSearch::new(1)
            .with_repeats(2)
            .run(&space(vec![3, 5], vec![2, 4]), &train, &dev)
            .unwrap();
        assert_eq!(result.candidates.len(), 4);
        assert_eq!(result.recalls.len(), 4);
        assert!(result.recalls.iter().all(|r| r.len() == 2));
        assert!(result.averages.iter().all(|&a| (a - 1.0).abs() < 1e-12));
        assert_eq!(result.best_index, 0);
        assert_eq!(result.best, result.candidates[0]);
    }

    #[test]
    fn grid_search_reports_every_candidate() {
        let train = separable(10, 0.0);
        let dev = separable(5, 0.05);
        let result = GridSearch::new(3)
            .run(&space(vec![4], vec![1, 3]), &train, &dev)
            .unwrap();
        assert_eq!(result.mean_scores.len(), 2);
        assert_eq!(result.std_scores.len(), 2);
        assert_eq!(result.best_index, 0);
        assert!((result.dev_score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn grid_search_with_fewer_folds_accepts_small_classes() {
        // Three samples per class fail five folds but fit three.
        let train = separable(2, 0.0);
        let dev = separable(1, 0.05);
        let space = space(vec![4], vec![2]);
        assert!(matches!(
            GridSearch::new(3).run(&space, &train, &dev),
            Err(ModelError::Forest(_))
        ));
        let search = GridSearch::new(3).with_n_folds(3);
        assert_eq!(search.n_folds(), 3);
        let result = search.run(&space, &train, &dev).unwrap();
        assert_eq!(result.mean_scores.len(), 1);
        assert!((0.0..=1.0).contains(&result.mean_scores[0]));
    }
}
