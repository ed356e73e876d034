//! Random Forest classification: train, predict, score, cross-validate.
//!
//! A CART forest with Gini/Entropy criteria, optional class-balanced sample
//! weighting, parallel tree construction and batch prediction via rayon,
//! stratified k-fold cross-validation, and bincode model persistence.

mod config;
mod confusion;
mod error;
mod eval;
mod forest;
mod node;
mod predict;
mod result;
mod serialize;
mod split;
mod tree;

pub use config::{ClassWeight, MaxFeatures, RandomForestConfig};
pub use confusion::{ClassMetrics, ConfusionMatrix, accuracy_score, recall_macro};
pub use error::RfError;
pub use eval::{CrossValidation, CrossValidationResult, Scoring, mean_and_std};
pub use forest::RandomForest;
pub use node::{FeatureIndex, Impurity, Node, NodeIndex};
pub use predict::ClassDistribution;
pub use result::{RandomForestResult, TrainingMetadata};
pub use split::SplitCriterion;
pub use tree::{DecisionTree, DecisionTreeConfig};
