//! CSV feature table reader with full input validation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::{FeatureTable, SampleId};

/// Header name that marks the second column as class labels.
const LABEL_COLUMN: &str = "label";

/// Reads a feature table from a CSV file.
///
/// Expected CSV format:
/// - Header row required; the first column is the sample id
/// - Labeled: `id,label,feature1,...,featureN`
/// - Unlabeled: `id,feature1,...,featureN`
/// - One row per sample, all rows must have the same number of columns
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed CSV record |
/// | [`IoError::NoFeatureColumns`] | Header has no feature columns |
/// | [`IoError::EmptyDataset`] | Zero data rows after header |
/// | [`IoError::InconsistentRowLength`] | Row has different column count than header |
/// | [`IoError::InvalidLabel`] | Label cell is not a non-negative integer |
/// | [`IoError::NonFiniteValue`] | Cell is NaN, Inf, or unparseable float |
/// | [`IoError::DuplicateSampleId`] | Same id appears twice |
pub struct FeatureTableReader {
    path: PathBuf,
}

impl FeatureTableReader {
    /// Create a new reader for the given CSV file path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Read and validate the CSV file, returning a [`FeatureTable`].
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<FeatureTable, IoError> {
        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;

        // flexible(true) lets InconsistentRowLength fire instead of a
        // low-level CsvParse error.
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let header = rdr.headers().map_err(|e| self.csv_error(e))?;
        let expected_cols = header.len();
        let labeled = header
            .get(1)
            .is_some_and(|name| name.eq_ignore_ascii_case(LABEL_COLUMN));
        let first_feature_col = if labeled { 2 } else { 1 };

        if expected_cols <= first_feature_col {
            return Err(IoError::NoFeatureColumns {
                path: self.path.clone(),
            });
        }
        let feature_names: Vec<String> = header
            .iter()
            .skip(first_feature_col)
            .map(String::from)
            .collect();
        debug!(expected_cols, labeled, "read CSV header");

        let mut sample_ids = Vec::new();
        let mut features = Vec::new();
        let mut labels = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();

        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| self.csv_error(e))?;
            let sample_id = record.get(0).unwrap_or("").to_string();

            if record.len() != expected_cols {
                return Err(IoError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    sample_id,
                    expected: expected_cols,
                    got: record.len(),
                });
            }

            if let Some(&first_row) = seen.get(&sample_id) {
                return Err(IoError::DuplicateSampleId {
                    path: self.path.clone(),
                    sample_id,
                    first_row,
                    second_row: row_index,
                });
            }
            seen.insert(sample_id.clone(), row_index);

            if labeled {
                let raw = record.get(1).unwrap_or("");
                let label: usize = raw.parse().map_err(|_| IoError::InvalidLabel {
                    path: self.path.clone(),
                    row_index,
                    raw: raw.to_string(),
                })?;
                labels.push(label);
            }

            let mut row = Vec::with_capacity(feature_names.len());
            for (col_index, raw) in record.iter().skip(first_feature_col).enumerate() {
                let value = raw
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| IoError::NonFiniteValue {
                        path: self.path.clone(),
                        row_index,
                        col_index,
                        raw: raw.to_string(),
                    })?;
                row.push(value);
            }

            sample_ids.push(SampleId::new(sample_id));
            features.push(row);
        }

        if sample_ids.is_empty() {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }

        info!(
            n_samples = sample_ids.len(),
            n_features = feature_names.len(),
            labeled,
            "feature table loaded"
        );

        Ok(FeatureTable::new(
            self.path.clone(),
            sample_ids,
            feature_names,
            features,
            labeled.then_some(labels),
        ))
    }

    fn csv_error(&self, e: csv::Error) -> IoError {
        IoError::CsvParse {
            path: self.path.clone(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        }
    }
}
