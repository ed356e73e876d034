//! JSON artifact writer for evaluation reports and class probabilities.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::{FeatureName, SampleId};

/// Accuracy and macro recall of one data split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SplitScores {
    pub n_samples: usize,
    pub accuracy: f64,
    pub macro_recall: f64,
}

/// Writes evaluation and probability artifacts to JSON files.
///
/// Creates the output directory on construction if it does not exist.
/// Output files are named `{feature}_evaluation.json` and
/// `{feature}_probabilities.json`.
pub struct ResultWriter {
    output_dir: PathBuf,
    feature: FeatureName,
}

impl ResultWriter {
    /// Create a new writer targeting the given directory and feature name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OutputDirCreate`] if the directory cannot be created.
    #[instrument(skip_all, fields(dir = %output_dir.display(), feature = %feature))]
    pub fn new(output_dir: &Path, feature: FeatureName) -> Result<Self, IoError> {
        fs::create_dir_all(output_dir).map_err(|e| IoError::OutputDirCreate {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
        debug!("output directory ready");
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            feature,
        })
    }

    /// Write an evaluation report to `{feature}_evaluation.json`.
    ///
    /// `hyperparameters` is embedded verbatim. Takes primitives so the writer
    /// does not depend on the model crates.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::Serialize`] | JSON encoding failed |
    /// | [`IoError::WriteFile`] | file write failed |
    #[instrument(skip_all, fields(feature = %self.feature))]
    pub fn write_evaluation(
        &self,
        model: &str,
        hyperparameters: &serde_json::Value,
        train: SplitScores,
        dev: SplitScores,
        dev_confusion: &[Vec<usize>],
    ) -> Result<PathBuf, IoError> {
        let path = self.artifact_path("evaluation.json");

        let artifact = EvaluationArtifact {
            feature: self.feature.as_str(),
            model,
            hyperparameters,
            train,
            dev,
            dev_confusion_matrix: dev_confusion,
        };
        self.write_json(&path, &artifact)?;

        info!(path = %path.display(), "evaluation written");
        Ok(path)
    }

    /// Write per-sample predicted classes and class probabilities to
    /// `{feature}_probabilities.json`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::LengthMismatch`] | `predicted` or `probabilities` differs in length from `sample_ids` |
    /// | [`IoError::Serialize`] | JSON encoding failed |
    /// | [`IoError::WriteFile`] | file write failed |
    #[instrument(skip_all, fields(feature = %self.feature, n_samples = sample_ids.len()))]
    pub fn write_probabilities(
        &self,
        sample_ids: &[SampleId],
        predicted: &[usize],
        probabilities: &[Vec<f64>],
    ) -> Result<PathBuf, IoError> {
        if predicted.len() != sample_ids.len() {
            return Err(IoError::LengthMismatch {
                what: "predicted classes",
                expected: sample_ids.len(),
                got: predicted.len(),
            });
        }
        if probabilities.len() != sample_ids.len() {
            return Err(IoError::LengthMismatch {
                what: "probability rows",
                expected: sample_ids.len(),
                got: probabilities.len(),
            });
        }
        let path = self.artifact_path("probabilities.json");

        let samples: Vec<SampleEntry> = sample_ids
            .iter()
            .zip(predicted)
            .zip(probabilities)
            .map(|((id, &predicted_class), distribution)| SampleEntry {
                id: id.as_str(),
                predicted_class,
                probabilities: distribution,
            })
            .collect();

        let artifact = ProbabilityArtifact {
            feature: self.feature.as_str(),
            n_samples: samples.len(),
            n_classes: probabilities.first().map_or(0, Vec::len),
            samples,
        };
        self.write_json(&path, &artifact)?;

        info!(path = %path.display(), "probabilities written");
        Ok(path)
    }

    /// Return the path where the model binary should be saved.
    ///
    /// Does not write anything; just computes `{output_dir}/{feature}_model.bin`.
    #[must_use]
    pub fn model_path(&self) -> PathBuf {
        self.artifact_path("model.bin")
    }

    fn artifact_path(&self, suffix: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{suffix}", self.feature.as_str()))
    }

    fn write_json<T: Serialize>(&self, path: &Path, artifact: &T) -> Result<(), IoError> {
        let json = serde_json::to_string_pretty(artifact).map_err(|e| IoError::Serialize {
            path: path.to_path_buf(),
            source: e,
        })?;
        fs::write(path, json).map_err(|e| IoError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

// --- Shadow structs for JSON serialization ---

#[derive(Serialize)]
struct EvaluationArtifact<'a> {
    feature: &'a str,
    model: &'a str,
    hyperparameters: &'a serde_json::Value,
    train: SplitScores,
    dev: SplitScores,
    dev_confusion_matrix: &'a [Vec<usize>],
}

#[derive(Serialize)]
struct ProbabilityArtifact<'a> {
    feature: &'a str,
    n_samples: usize,
    n_classes: usize,
    samples: Vec<SampleEntry<'a>>,
}

#[derive(Serialize)]
struct SampleEntry<'a> {
    id: &'a str,
    predicted_class: usize,
    probabilities: &'a [f64],
}
