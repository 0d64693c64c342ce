//! On-disk persistence for trained models
//!
//! Layout under `<model_dir>/<region_key>/`:
//! - `<param>_model.json` and `<param>_scaler.json` per trained parameter
//! - `metadata.json` with metrics, training time and artifact checksums
//!
//! Every file is written to a temp path and renamed into place, and the
//! metadata is written last, so a reader never sees a half-written set.

use super::family::{FeatureImportance, FittedModel};
use super::scaler::FeatureScaler;
use super::TrainedModel;
use crate::models::{ModelMetrics, TargetParameter};
use crate::persist::{compute_checksum, remove_if_present, write_atomic};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const METADATA_FILE: &str = "metadata.json";

/// Sidecar describing the persisted model set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub metrics: BTreeMap<TargetParameter, ModelMetrics>,
    pub trained_date: DateTime<Utc>,
    /// SHA-256 of each artifact, keyed by file name
    #[serde(default)]
    pub checksums: BTreeMap<String, String>,
}

/// Persisted form of a fitted estimator
#[derive(Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model: FittedModel,
    #[serde(default)]
    pub feature_importance: Option<Vec<FeatureImportance>>,
}

/// Model persistence scoped to one region
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(model_root: &Path, region_key: &str) -> Self {
        Self {
            dir: model_root.join(region_key),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    pub fn model_path(&self, parameter: TargetParameter) -> PathBuf {
        self.dir.join(model_file(parameter))
    }

    pub fn scaler_path(&self, parameter: TargetParameter) -> PathBuf {
        self.dir.join(scaler_file(parameter))
    }

    /// Persist a model set trained at `trained_at`. Failures are logged and
    /// reported as `false`.
    pub fn save(
        &self,
        models: &BTreeMap<TargetParameter, TrainedModel>,
        trained_at: DateTime<Utc>,
    ) -> bool {
        match self.try_save(models, trained_at) {
            Ok(()) => {
                info!(dir = %self.dir.display(), models = models.len(), "Models saved");
                true
            }
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "Could not save models");
                false
            }
        }
    }

    fn try_save(
        &self,
        models: &BTreeMap<TargetParameter, TrainedModel>,
        trained_at: DateTime<Utc>,
    ) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create model directory {:?}", self.dir))?;

        let mut checksums = BTreeMap::new();
        let mut metrics = BTreeMap::new();

        for (parameter, trained) in models {
            let artifact = ModelArtifactRef {
                model: &trained.model,
                feature_importance: trained.feature_importance.as_ref(),
            };
            let model_bytes =
                serde_json::to_vec(&artifact).context("Failed to serialize model")?;
            let scaler_bytes =
                serde_json::to_vec(&trained.scaler).context("Failed to serialize scaler")?;

            write_atomic(&self.model_path(*parameter), &model_bytes)?;
            write_atomic(&self.scaler_path(*parameter), &scaler_bytes)?;

            checksums.insert(model_file(*parameter), compute_checksum(&model_bytes));
            checksums.insert(scaler_file(*parameter), compute_checksum(&scaler_bytes));
            metrics.insert(*parameter, trained.metrics.clone());
        }

        // Drop pairs from an earlier run that this model set no longer covers
        for parameter in TargetParameter::ALL {
            if !models.contains_key(&parameter) {
                remove_if_present(&self.model_path(parameter));
                remove_if_present(&self.scaler_path(parameter));
            }
        }

        let metadata = ModelMetadata {
            metrics,
            trained_date: trained_at,
            checksums,
        };
        let json = serde_json::to_vec_pretty(&metadata).context("Failed to serialize metadata")?;
        write_atomic(&self.metadata_path(), &json)
    }

    /// Read the metadata sidecar. Absent or unreadable metadata is `None`.
    pub fn read_metadata(&self) -> Option<ModelMetadata> {
        let path = self.metadata_path();
        if !path.exists() {
            debug!(path = %path.display(), "No model metadata found");
            return None;
        }

        let result = fs::read(&path)
            .with_context(|| format!("Failed to read {:?}", path))
            .and_then(|data| {
                serde_json::from_slice::<ModelMetadata>(&data).context("Failed to parse model metadata")
            });

        match result {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable model metadata");
                None
            }
        }
    }

    /// Load one parameter's model and scaler. Both files must exist, parse,
    /// and match any recorded checksum; otherwise the parameter is
    /// unavailable and `None` is returned.
    pub fn load_pair(
        &self,
        parameter: TargetParameter,
        metadata: &ModelMetadata,
    ) -> Option<(ModelArtifact, FeatureScaler)> {
        let model_path = self.model_path(parameter);
        let scaler_path = self.scaler_path(parameter);

        if !(model_path.exists() && scaler_path.exists()) {
            debug!(parameter = %parameter, "Model or scaler file missing");
            return None;
        }

        match self.try_load_pair(parameter, metadata) {
            Ok(pair) => Some(pair),
            Err(e) => {
                warn!(parameter = %parameter, error = %e, "Model unavailable");
                None
            }
        }
    }

    fn try_load_pair(
        &self,
        parameter: TargetParameter,
        metadata: &ModelMetadata,
    ) -> Result<(ModelArtifact, FeatureScaler)> {
        let model_bytes = read_verified(&self.model_path(parameter), &model_file(parameter), metadata)?;
        let scaler_bytes =
            read_verified(&self.scaler_path(parameter), &scaler_file(parameter), metadata)?;

        let artifact: ModelArtifact =
            serde_json::from_slice(&model_bytes).context("Failed to parse model artifact")?;
        let scaler: FeatureScaler =
            serde_json::from_slice(&scaler_bytes).context("Failed to parse scaler artifact")?;
        Ok((artifact, scaler))
    }

    /// Remove every artifact for this region
    pub fn clear(&self) {
        for parameter in TargetParameter::ALL {
            remove_if_present(&self.model_path(parameter));
            remove_if_present(&self.scaler_path(parameter));
        }
        remove_if_present(&self.metadata_path());
    }
}

/// Borrowed twin of `ModelArtifact` so saving needs no clone of the model
#[derive(Serialize)]
struct ModelArtifactRef<'a> {
    model: &'a FittedModel,
    feature_importance: Option<&'a Vec<FeatureImportance>>,
}

fn model_file(parameter: TargetParameter) -> String {
    format!("{}_model.json", parameter)
}

fn scaler_file(parameter: TargetParameter) -> String {
    format!("{}_scaler.json", parameter)
}

fn read_verified(path: &Path, name: &str, metadata: &ModelMetadata) -> Result<Vec<u8>> {
    let data = fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    if let Some(expected) = metadata.checksums.get(name) {
        let actual = compute_checksum(&data);
        if &actual != expected {
            anyhow::bail!("Checksum mismatch for {}: expected {}, got {}", name, expected, actual);
        }
    }
    Ok(data)
}
