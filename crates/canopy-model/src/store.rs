//! On-disk layout of the config directory and the tuned-parameter cache.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::error::ModelError;
use crate::params::Hyperparameters;

/// Root of the configuration tree, `config` by default.
///
/// ```text
/// <root>/model.json
/// <root>/<model>_<feature>_params.json
/// <root>/baseline/<model>_<feature>_params.json
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLayout {
    root: PathBuf,
}

impl Default for ConfigLayout {
    fn default() -> Self {
        Self::new("config")
    }
}

impl ConfigLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the search-space file.
    #[must_use]
    pub fn model_json(&self) -> PathBuf {
        self.root.join("model.json")
    }

    /// Path of the tuned-parameter file for one model and feature.
    #[must_use]
    pub fn params_path(&self, model_name: &str, feature_name: &str, baseline: bool) -> PathBuf {
        let dir = if baseline {
            self.root.join("baseline")
        } else {
            self.root.clone()
        };
        dir.join(format!("{model_name}_{feature_name}_params.json"))
    }
}

/// A tuned-parameter file.
#[derive(Debug, Clone)]
pub struct ParamStore {
    path: PathBuf,
}

impl ParamStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored set; `Ok(None)` when the file does not exist.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ModelError::ReadParams`] | file exists but cannot be read |
    /// | [`ModelError::ParseParams`] | malformed JSON or bad values |
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> Result<Option<Hyperparameters>, ModelError> {
        if !self.path.is_file() {
            debug!("no stored hyperparameters");
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path).map_err(|source| ModelError::ReadParams {
            path: self.path.clone(),
            source,
        })?;
        let params: Hyperparameters =
            serde_json::from_str(&text).map_err(|source| ModelError::ParseParams {
                path: self.path.clone(),
                source,
            })?;
        debug!(%params, "stored hyperparameters loaded");
        Ok(Some(params))
    }

    /// Overwrite the file with `params` as compact JSON plus a newline,
    /// creating the parent directory if needed.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ModelError::CreateDir`] | parent directory cannot be created |
    /// | [`ModelError::SerializeParams`] | JSON encoding failed |
    /// | [`ModelError::WriteParams`] | file write failed |
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub fn save(&self, params: &Hyperparameters) -> Result<(), ModelError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ModelError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let mut json =
            serde_json::to_string(params).map_err(|source| ModelError::SerializeParams {
                path: self.path.clone(),
                source,
            })?;
        json.push('\n');
        fs::write(&self.path, json).map_err(|source| ModelError::WriteParams {
            path: self.path.clone(),
            source,
        })?;
        info!(%params, "hyperparameters saved");
        Ok(())
    }
}
