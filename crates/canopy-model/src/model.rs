//! The random-forest orchestrator: parameter lookup, tuning, fitting and
//! evaluation for one feature set.

use std::path::Path;

use canopy_rf::{ClassWeight, ConfusionMatrix, RandomForest, RandomForestConfig};
use tracing::{debug, info, instrument};

use crate::data::DataSplits;
use crate::error::ModelError;
use crate::params::Hyperparameters;
use crate::search::SearchSpace;
use crate::store::{ConfigLayout, ParamStore};
use crate::tune::{DevSearch, DevSearchResult, GridSearch, GridSearchResult};

/// Short model name used in parameter file names.
pub const MODEL_NAME: &str = "RF";

/// Mode flags fixed at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunMode {
    /// Start from [`Hyperparameters::placeholder`] instead of unset values.
    pub test: bool,
    /// Use the `baseline/` parameter file and cross-validated grid search.
    pub baseline: bool,
}

impl RunMode {
    #[must_use]
    pub fn with_test(mut self, test: bool) -> Self {
        self.test = test;
        self
    }

    #[must_use]
    pub fn with_baseline(mut self, baseline: bool) -> Self {
        self.baseline = baseline;
        self
    }
}

/// Predictions and scores from [`RandomForestModel::evaluate`].
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub train_predictions: Vec<usize>,
    pub dev_predictions: Vec<usize>,
    pub train_accuracy: f64,
    pub dev_accuracy: f64,
    pub train_recall: f64,
    pub dev_recall: f64,
    pub dev_confusion: ConfusionMatrix,
}

/// Configures, tunes, trains and evaluates a random forest for one feature.
///
/// Lifecycle: [`new`](Self::new) with fixed data, then [`run`](Self::run)
/// (which may tune and always trains), then [`evaluate`](Self::evaluate) and
/// [`session_probability`](Self::session_probability).
#[derive(Debug)]
pub struct RandomForestModel {
    feature_name: String,
    splits: DataSplits,
    mode: RunMode,
    search_space: SearchSpace,
    store: ParamStore,
    hyperparameters: Hyperparameters,
    seed: u64,
    config: Option<RandomForestConfig>,
    forest: Option<RandomForest>,
}

impl RandomForestModel {
    /// Create an orchestrator and load the search space from
    /// `layout.model_json()`. Hyperparameters start unset.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ModelError::ReadConfig`] | `model.json` missing or unreadable |
    /// | [`ModelError::ParseConfig`] | `model.json` malformed |
    #[instrument(skip(splits, layout), fields(config_root = %layout.root().display()))]
    pub fn new(
        feature_name: &str,
        splits: DataSplits,
        mode: RunMode,
        layout: &ConfigLayout,
    ) -> Result<Self, ModelError> {
        let search_space = SearchSpace::load(&layout.model_json())?;
        let store = ParamStore::new(layout.params_path(MODEL_NAME, feature_name, mode.baseline));
        Ok(Self {
            feature_name: feature_name.to_string(),
            splits,
            mode,
            search_space,
            store,
            hyperparameters: Hyperparameters::default(),
            seed: 42,
            config: None,
            forest: None,
        })
    }

    /// Seed for tuning fits and the final forest.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Resolve hyperparameters, tuning if needed, then configure and train.
    ///
    /// 1. In test mode, start from the placeholder set.
    /// 2. If the parameter file exists, its contents replace the set.
    /// 3. If the set is incomplete, tune (grid search in baseline mode,
    ///    dev search otherwise) and persist the winner.
    /// 4. Build a class-balanced forest and train it.
    ///
    /// # Errors
    ///
    /// Propagates parameter-file, tuning and training errors.
    #[instrument(skip(self), fields(feature = %self.feature_name, test = self.mode.test, baseline = self.mode.baseline))]
    pub fn run(&mut self) -> Result<(), ModelError> {
        if self.mode.test {
            self.hyperparameters = Hyperparameters::placeholder();
        }

        if let Some(stored) = self.store.load()? {
            self.hyperparameters = stored;
        }

        if !self.hyperparameters.is_complete() {
            info!("hyperparameters are not tuned yet");
            if self.mode.baseline {
                self.tune()?;
            } else {
                self.tune_dev()?;
            }
        }

        self.config = Some(
            self.hyperparameters
                .to_forest_config(ClassWeight::Balanced, self.seed)?,
        );
        info!(
            params = %self.hyperparameters,
            threads = rayon::current_num_threads(),
            "Random Forest configured"
        );
        self.train()
    }

    /// Fit the configured forest on the train split.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ModelError::NotConfigured`] | called before [`run`](Self::run) |
    /// | [`ModelError::Forest`] | training failed |
    #[instrument(skip(self), fields(feature = %self.feature_name))]
    pub fn train(&mut self) -> Result<(), ModelError> {
        let config = self.config.as_ref().ok_or(ModelError::NotConfigured)?;
        info!("training a Random Forest Classifier");
        let train = self.splits.train();
        let result = config.fit(train.features(), train.labels(), &[])?;
        self.forest = Some(result.into_forest());
        Ok(())
    }

    /// Predict train and dev, and report accuracy and macro recall.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ModelError::NotFitted`] | called before training |
    /// | [`ModelError::Forest`] | prediction failed |
    #[instrument(skip(self), fields(feature = %self.feature_name))]
    pub fn evaluate(&self) -> Result<EvaluationReport, ModelError> {
        let forest = self.forest.as_ref().ok_or(ModelError::NotFitted)?;
        info!("evaluating the Random Forest Classifier");

        let train = self.splits.train();
        let dev = self.splits.dev();
        let n_classes = forest.n_classes().max(self.splits.n_classes());

        let train_predictions = forest.predict_batch(train.features())?;
        let dev_predictions = forest.predict_batch(dev.features())?;
        let train_confusion =
            ConfusionMatrix::from_labels(train.labels(), &train_predictions, n_classes)?;
        let dev_confusion = ConfusionMatrix::from_labels(dev.labels(), &dev_predictions, n_classes)?;

        let report = EvaluationReport {
            train_accuracy: train_confusion.accuracy(),
            dev_accuracy: dev_confusion.accuracy(),
            train_recall: train_confusion.macro_recall(),
            dev_recall: dev_confusion.macro_recall(),
            train_predictions,
            dev_predictions,
            dev_confusion,
        };
        info!(
            accuracy = %format!("{:.3}", report.train_accuracy),
            "accuracy on training set"
        );
        info!(
            accuracy = %format!("{:.3}", report.dev_accuracy),
            "accuracy on development set"
        );
        debug!("development confusion matrix\n{}", report.dev_confusion);
        Ok(report)
    }

    /// Tune by cross-validated grid search over train and dev stacked, then
    /// persist the winner.
    ///
    /// # Errors
    ///
    /// Propagates search and parameter-file errors.
    pub fn tune(&mut self) -> Result<GridSearchResult, ModelError> {
        let result = GridSearch::new(self.seed).run(
            &self.search_space,
            self.splits.train(),
            self.splits.dev(),
        )?;
        self.adopt(result.best.clone())?;
        Ok(result)
    }

    /// Tune by repeated class-balanced fits on train scored on dev, then
    /// persist the winner.
    ///
    /// # Errors
    ///
    /// Propagates search and parameter-file errors.
    pub fn tune_dev(&mut self) -> Result<DevSearchResult, ModelError> {
        let result = DevSearch::new(self.seed).run(
            &self.search_space,
            self.splits.train(),
            self.splits.dev(),
        )?;
        self.adopt(result.best.clone())?;
        Ok(result)
    }

    /// Posterior class probabilities for every dev row, in dev order.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ModelError::NotFitted`] | called before training |
    /// | [`ModelError::Forest`] | prediction failed |
    pub fn session_probability(&self) -> Result<Vec<Vec<f64>>, ModelError> {
        let forest = self.forest.as_ref().ok_or(ModelError::NotFitted)?;
        let distributions = forest.predict_proba_batch(self.splits.dev().features())?;
        Ok(distributions.into_iter().map(|d| d.into_vec()).collect())
    }

    fn adopt(&mut self, best: Hyperparameters) -> Result<(), ModelError> {
        self.hyperparameters = best;
        self.store.save(&self.hyperparameters)
    }

    // --- Accessors ---

    #[must_use]
    pub fn feature_name(&self) -> &str {
        &self.feature_name
    }

    #[must_use]
    pub fn model_name(&self) -> &'static str {
        MODEL_NAME
    }

    #[must_use]
    pub fn mode(&self) -> RunMode {
        self.mode
    }

    #[must_use]
    pub fn hyperparameters(&self) -> &Hyperparameters {
        &self.hyperparameters
    }

    #[must_use]
    pub fn search_space(&self) -> &SearchSpace {
        &self.search_space
    }

    /// The parameter file this model reads and writes.
    #[must_use]
    pub fn params_path(&self) -> &Path {
        self.store.path()
    }

    #[must_use]
    pub fn splits(&self) -> &DataSplits {
        &self.splits
    }

    /// The trained forest, once [`train`](Self::train) has succeeded.
    #[must_use]
    pub fn forest(&self) -> Option<&RandomForest> {
        self.forest.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::data::LabeledSplit;

    fn splits() -> DataSplits {
        let train = LabeledSplit::new(
            "train",
            vec![vec![0.0], vec![0.1], vec![5.0], vec![5.1]],
            vec![0, 0, 1, 1],
        )
        .unwrap();
        let dev = LabeledSplit::new("dev", vec![vec![0.05], vec![5.05]], vec![0, 1]).unwrap();
        DataSplits::new(train, dev).unwrap()
    }

    fn layout(dir: &TempDir) -> ConfigLayout {
        fs::write(
            dir.path().join("model.json"),
            r#"{"baseline": {"random_forest": {"n_estimators": [3], "max_features": [1], "max_depth": [2]}}}"#,
        )
        .unwrap();
        ConfigLayout::new(dir.path())
    }

    #[test]
    fn new_starts_unset_with_feature_path() {
        let dir = TempDir::new().unwrap();
        let model = RandomForestModel::new("FAU", splits(), RunMode::default(), &layout(&dir)).unwrap();
        assert_eq!(model.hyperparameters(), &Hyperparameters::default());
        assert_eq!(model.params_path(), dir.path().join("RF_FAU_params.json"));
        assert!(model.forest().is_none());
    }

    #[test]
    fn baseline_mode_selects_baseline_path() {
        let dir = TempDir::new().unwrap();
        let mode = RunMode::default().with_baseline(true);
        let model = RandomForestModel::new("FAU", splits(), mode, &layout(&dir)).unwrap();
        assert_eq!(
            model.params_path(),
            dir.path().join("baseline").join("RF_FAU_params.json")
        );
    }

    #[test]
    fn missing_model_json_fails_construction() {
        let dir = TempDir::new().unwrap();
        let err = RandomForestModel::new("FAU", splits(), RunMode::default(), &ConfigLayout::new(dir.path()))
            .unwrap_err();
        assert!(matches!(err, ModelError::ReadConfig { .. }));
    }

    #[test]
    fn train_before_run_is_not_configured() {
        let dir = TempDir::new().unwrap();
        let mut model = RandomForestModel::new("FAU", splits(), RunMode::default(), &layout(&dir)).unwrap();
        assert!(matches!(model.train(), Err(ModelError::NotConfigured)));
    }

    #[test]
    fn predictions_before_training_are_not_fitted() {
        let dir = TempDir::new().unwrap();
        let model = RandomForestModel::new("FAU", splits(), RunMode::default(), &layout(&dir)).unwrap();
        assert!(matches!(model.evaluate(), Err(ModelError::NotFitted)));
        assert!(matches!(model.session_probability(), Err(ModelError::NotFitted)));
    }
}
