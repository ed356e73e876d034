//! Random-forest orchestration: hyperparameter lookup and caching, grid and
//! dev-set tuning, training, evaluation and class probabilities.

mod data;
mod error;
mod model;
mod params;
mod search;
mod store;
mod tune;

pub use data::{DataSplits, LabeledSplit};
pub use error::ModelError;
pub use model::{EvaluationReport, MODEL_NAME, RandomForestModel, RunMode};
pub use params::{Hyperparameters, MaxFeaturesParam, MaxFeaturesRule};
pub use search::SearchSpace;
pub use store::{ConfigLayout, ParamStore};
pub use tune::{DevSearch, DevSearchResult, GridSearch, GridSearchResult};
