//! Domain types for canopy-io.

use std::path::{Path, PathBuf};

use crate::IoError;

/// A sample identifier from the first column of a feature table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SampleId(String);

impl SampleId {
    pub(crate) fn new(id: String) -> Self {
        Self(id)
    }

    /// Return the sample ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SampleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated feature name, used both as the parameter-file key and as the
/// prefix of every output artifact.
///
/// Must match `[a-zA-Z0-9_-]+`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureName(String);

impl FeatureName {
    /// Parse and validate a feature name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidFeatureName`] if the name is empty or
    /// contains characters outside `[a-zA-Z0-9_-]`.
    pub fn new(name: String) -> Result<Self, IoError> {
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(IoError::InvalidFeatureName { name });
        }
        Ok(Self(name))
    }

    /// Return the feature name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FeatureName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for FeatureName {
    type Err = IoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

/// A table of numeric features, optionally with class labels.
///
/// Produced by [`FeatureTableReader`](crate::FeatureTableReader). Sample IDs,
/// feature rows and labels are parallel vectors: `sample_ids[i]` corresponds
/// to `features[i]` and `labels[i]`.
#[derive(Debug)]
pub struct FeatureTable {
    path: PathBuf,
    sample_ids: Vec<SampleId>,
    feature_names: Vec<String>,
    features: Vec<Vec<f64>>,
    labels: Option<Vec<usize>>,
}

impl FeatureTable {
    pub(crate) fn new(
        path: PathBuf,
        sample_ids: Vec<SampleId>,
        feature_names: Vec<String>,
        features: Vec<Vec<f64>>,
        labels: Option<Vec<usize>>,
    ) -> Self {
        Self {
            path,
            sample_ids,
            feature_names,
            features,
            labels,
        }
    }

    /// File the table was read from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn sample_ids(&self) -> &[SampleId] {
        &self.sample_ids
    }

    /// Feature column names from the CSV header.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Feature matrix (row-major).
    #[must_use]
    pub fn features(&self) -> &[Vec<f64>] {
        &self.features
    }

    /// Class labels, when the file had a `label` column.
    #[must_use]
    pub fn labels(&self) -> Option<&[usize]> {
        self.labels.as_deref()
    }

    /// Class labels, failing if the table is unlabeled.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MissingLabels`] if the file had no `label` column.
    pub fn require_labels(&self) -> Result<&[usize], IoError> {
        self.labels().ok_or_else(|| IoError::MissingLabels {
            path: self.path.clone(),
        })
    }

    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    #[must_use]
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Split into the feature matrix and labels, dropping IDs and names.
    #[must_use]
    pub fn into_parts(self) -> (Vec<Vec<f64>>, Option<Vec<usize>>) {
        (self.features, self.labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_id_as_str_returns_inner() {
        let id = SampleId::new("spk01_sess03".to_string());
        assert_eq!(id.as_str(), "spk01_sess03");
    }

    #[test]
    fn feature_name_valid() {
        let name = FeatureName::new("FAU-v2_01".to_string()).unwrap();
        assert_eq!(name.as_str(), "FAU-v2_01");
    }

    #[test]
    fn feature_name_rejects_empty() {
        let name = FeatureName::new(String::new());
        assert!(matches!(name, Err(IoError::InvalidFeatureName { .. })));
    }

    #[test]
    fn feature_name_rejects_path_separators() {
        assert!("../FAU".parse::<FeatureName>().is_err());
        assert!("a b".parse::<FeatureName>().is_err());
    }

    #[test]
    fn require_labels_on_unlabeled_table() {
        let table = FeatureTable::new(
            PathBuf::from("dev.csv"),
            vec![SampleId::new("a".into())],
            vec!["f0".into()],
            vec![vec![1.0]],
            None,
        );
        assert!(table.labels().is_none());
        assert!(matches!(
            table.require_labels(),
            Err(IoError::MissingLabels { .. })
        ));
    }
}
