//! Hyperparameter search space loaded from `model.json`.

use std::path::Path;

use canopy_rf::SplitCriterion;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::ModelError;
use crate::params::{Hyperparameters, MaxFeaturesParam};

#[derive(Deserialize)]
struct ModelConfig {
    baseline: BaselineSection,
}

#[derive(Deserialize)]
struct BaselineSection {
    random_forest: SearchSpace,
}

fn default_criteria() -> Vec<SplitCriterion> {
    vec![SplitCriterion::Entropy]
}

/// Candidate values for each hyperparameter.
///
/// Read from `baseline.random_forest` in `model.json`. A `null` depth means
/// unbounded. The criterion axis is always `["entropy"]`: a `criterion` key in
/// the file is not read, and neither are any other keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    pub n_estimators: Vec<usize>,
    pub max_features: Vec<MaxFeaturesParam>,
    pub max_depth: Vec<Option<usize>>,
    #[serde(skip_deserializing, default = "default_criteria")]
    pub criterion: Vec<SplitCriterion>,
}

impl SearchSpace {
    /// Load the search space from a `model.json` file.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ModelError::ReadConfig`] | file missing or unreadable |
    /// | [`ModelError::ParseConfig`] | malformed JSON, missing keys, bad values |
    #[instrument(fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let text = std::fs::read_to_string(path).map_err(|source| ModelError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ModelConfig =
            serde_json::from_str(&text).map_err(|source| ModelError::ParseConfig {
                path: path.to_path_buf(),
                source,
            })?;
        let space = config.baseline.random_forest;
        debug!(n_candidates = space.len(), "search space loaded");
        Ok(space)
    }

    /// Number of grid points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.criterion.len() * self.max_depth.len() * self.max_features.len() * self.n_estimators.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enumerate the grid.
    ///
    /// Keys are taken in alphabetical order (`criterion`, `max_depth`,
    /// `max_features`, `n_estimators`) with the last key varying fastest.
    #[must_use]
    pub fn candidates(&self) -> Vec<Hyperparameters> {
        let mut out = Vec::with_capacity(self.len());
        for &criterion in &self.criterion {
            for &max_depth in &self.max_depth {
                for &max_features in &self.max_features {
                    for &n_estimators in &self.n_estimators {
                        out.push(Hyperparameters {
                            n_estimators: Some(n_estimators),
                            max_features: Some(max_features),
                            max_depth,
                            criterion: Some(criterion),
                        });
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::params::MaxFeaturesRule;

    fn write_config(dir: &TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("model.json");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn load_ignores_other_sections() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"{
                "baseline": {
                    "random_forest": {
                        "n_estimators": [10, 50],
                        "max_features": [0.1, "sqrt"],
                        "max_depth": [2]
                    },
                    "svm": {"C": [1.0]}
                },
                "multi_task": {}
            }"#,
        );
        let space = SearchSpace::load(&path).unwrap();
        assert_eq!(space.n_estimators, vec![10, 50]);
        assert_eq!(
            space.max_features,
            vec![
                MaxFeaturesParam::Fraction(0.1),
                MaxFeaturesParam::Rule(MaxFeaturesRule::Sqrt)
            ]
        );
        assert_eq!(space.criterion, vec![SplitCriterion::Entropy]);
        assert_eq!(space.len(), 4);
    }

    #[test]
    fn candidates_vary_last_key_fastest() {
        let space = SearchSpace {
            n_estimators: vec![10, 20],
            max_features: vec![MaxFeaturesParam::Count(1), MaxFeaturesParam::Count(2)],
            max_depth: vec![Some(3), Some(5)],
            criterion: vec![SplitCriterion::Gini, SplitCriterion::Entropy],
        };
        let grid = space.candidates();
        assert_eq!(grid.len(), 16);
        assert_eq!(grid[0], Hyperparameters::new(10, MaxFeaturesParam::Count(1), 3, SplitCriterion::Gini));
        assert_eq!(grid[1], Hyperparameters::new(20, MaxFeaturesParam::Count(1), 3, SplitCriterion::Gini));
        assert_eq!(grid[2], Hyperparameters::new(10, MaxFeaturesParam::Count(2), 3, SplitCriterion::Gini));
        assert_eq!(grid[4], Hyperparameters::new(10, MaxFeaturesParam::Count(1), 5, SplitCriterion::Gini));
        assert_eq!(grid[8], Hyperparameters::new(10, MaxFeaturesParam::Count(1), 3, SplitCriterion::Entropy));
        assert!(grid.iter().all(Hyperparameters::is_complete));
    }

    #[test]
    fn empty_axis_empties_grid() {
        let space = SearchSpace {
            n_estimators: vec![10],
            max_features: vec![],
            max_depth: vec![Some(3)],
            criterion: default_criteria(),
        };
        assert!(space.is_empty());
        assert!(space.candidates().is_empty());
    }

    #[test]
    fn criterion_in_file_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"{"baseline": {"random_forest": {
                "n_estimators": [10],
                "max_features": ["sqrt"],
                "max_depth": [2, 4],
                "criterion": ["gini"]
            }}}"#,
        );
        let space = SearchSpace::load(&path).unwrap();
        assert_eq!(space.criterion, vec![SplitCriterion::Entropy]);
        let grid = space.candidates();
        assert_eq!(grid.len(), 2);
        assert!(grid.iter().all(|p| p.criterion == Some(SplitCriterion::Entropy)));
    }

    #[test]
    fn null_depth_yields_incomplete_candidate() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"{"baseline": {"random_forest": {
                "n_estimators": [10],
                "max_features": [0.5],
                "max_depth": [null, 3]
            }}}"#,
        );
        let space = SearchSpace::load(&path).unwrap();
        assert_eq!(space.max_depth, vec![None, Some(3)]);
        let grid = space.candidates();
        assert_eq!(grid[0].max_depth, None);
        assert!(!grid[0].is_complete());
        assert!(grid[1].is_complete());
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = TempDir::new().unwrap();
        let err = SearchSpace::load(&dir.path().join("model.json")).unwrap_err();
        assert!(matches!(err, ModelError::ReadConfig { .. }));
    }

    #[test]
    fn missing_key_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"{"baseline": {"random_forest": {"n_estimators": [10], "max_depth": [2]}}}"#,
        );
        let err = SearchSpace::load(&path).unwrap_err();
        assert!(matches!(err, ModelError::ParseConfig { .. }));
    }
}
