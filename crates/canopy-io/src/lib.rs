//! Feature table loading, validation, and JSON artifacts for canopy.

mod domain;
mod error;
mod reader;
mod writer;

pub use domain::{FeatureName, FeatureTable, SampleId};
pub use error::IoError;
pub use reader::FeatureTableReader;
pub use writer::{ResultWriter, SplitScores};
