//! Error types for canopy-model.

use std::path::PathBuf;

use canopy_rf::RfError;

/// Errors from configuration loading, parameter caching, tuning and training.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Returned when the search-space file cannot be read.
    #[error("cannot read model config {path}")]
    ReadConfig {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Returned when the search-space file is not valid JSON or lacks
    /// `baseline.random_forest` keys.
    #[error("invalid model config {path}")]
    ParseConfig {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Returned when an existing parameter file cannot be read.
    #[error("cannot read parameter file {path}")]
    ReadParams {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Returned when a parameter file holds malformed JSON or bad values.
    #[error("invalid parameter file {path}")]
    ParseParams {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("cannot encode hyperparameters for {path}")]
    SerializeParams {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Returned when the parameter directory cannot be created.
    #[error("cannot create directory {path}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot write parameter file {path}")]
    WriteParams {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Returned when a data split has no samples.
    #[error("{split} split has no samples")]
    EmptySplit { split: &'static str },

    #[error("{split} split has {n_samples} rows but {n_labels} labels")]
    LabelCountMismatch {
        split: &'static str,
        n_samples: usize,
        n_labels: usize,
    },

    /// Returned when train and dev rows differ in width.
    #[error("train rows have {train} features but dev rows have {dev}")]
    FeatureWidthMismatch { train: usize, dev: usize },

    /// Returned when a search-space axis is empty, leaving nothing to tune.
    #[error("hyperparameter search space is empty")]
    EmptySearchSpace,

    /// Returned when a forest is requested from a set with unset keys.
    #[error("hyperparameters are incomplete: {missing} is unset")]
    IncompleteHyperparameters { missing: &'static str },

    /// Returned by `train` before `run` has configured a forest.
    #[error("no forest has been configured; call run first")]
    NotConfigured,

    /// Returned by prediction methods before the forest is trained.
    #[error("the forest has not been trained")]
    NotFitted,

    #[error(transparent)]
    Forest(#[from] RfError),
}
