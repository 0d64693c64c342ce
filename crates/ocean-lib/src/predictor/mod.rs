//! Regression predictor: training, persistence and point prediction
//!
//! One `OceanPredictor` serves one region. Each target parameter gets its
//! own model and scaler; a parameter with too little clean data is skipped
//! rather than failing the whole run.

#[cfg(feature = "boosting")]
mod boosting;
mod evaluation;
mod family;
mod features;
mod output;
mod scaler;
mod store;

pub use evaluation::{mean_absolute_error, r2_score, round_to, train_test_split};
pub use family::{permutation_importance, FeatureImportance, FittedModel, ModelFamily};
pub use features::FeatureEncoder;
pub use output::{ParameterEstimate, Prediction, LOW_CONFIDENCE_THRESHOLD};
pub use scaler::FeatureScaler;
pub use store::{ModelArtifact, ModelMetadata, ModelStore};

use crate::clock::{system_clock, Clock};
use crate::error::PredictError;
use crate::models::{CleanedDataset, FeatureVector, ModelMetrics, TargetParameter};
use crate::observability::PipelineMetrics;
use crate::settings::ModelSettings;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Minimum clean rows required to train one parameter
pub const MIN_TRAINING_ROWS: usize = 50;

const N: usize = FeatureVector::LEN;

/// Trait for prediction implementations
pub trait Predictor: Send + Sync {
    /// Predict every available parameter at one point
    fn predict(
        &self,
        latitude: f64,
        longitude: f64,
        depth: f64,
        month: u32,
    ) -> Result<Prediction, PredictError>;

    /// Whether at least one parameter model is loaded
    fn is_ready(&self) -> bool;

    /// Held-out metrics per loaded parameter
    fn model_metrics(&self) -> BTreeMap<TargetParameter, ModelMetrics>;
}

/// A fitted model with its scaler and evaluation
pub struct TrainedModel {
    pub model: FittedModel,
    pub scaler: FeatureScaler,
    pub metrics: ModelMetrics,
    pub feature_importance: Option<Vec<FeatureImportance>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictorState {
    Untrained,
    Trained,
}

/// Why a parameter was not trained
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    InsufficientData { rows: usize },
    FitFailed(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::InsufficientData { rows } => {
                write!(f, "insufficient data ({} clean rows, need {})", rows, MIN_TRAINING_ROWS)
            }
            SkipReason::FitFailed(message) => write!(f, "fit failed: {}", message),
        }
    }
}

/// Result of one `train` call
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub trained: Vec<TargetParameter>,
    pub skipped: Vec<(TargetParameter, SkipReason)>,
    /// Whether the new model set reached disk
    pub persisted: bool,
}

impl TrainingReport {
    pub fn is_success(&self) -> bool {
        !self.trained.is_empty()
    }
}

/// Result of one `load` call
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// At least one parameter's model and scaler were restored
    Loaded { parameters: Vec<TargetParameter> },
    /// No metadata on disk
    NotFound,
    /// Metadata exists but no model/scaler pair was usable
    NoUsableModels,
}

/// Predictor for one region
pub struct OceanPredictor {
    region_key: String,
    family: ModelFamily,
    settings: ModelSettings,
    encoder: FeatureEncoder,
    store: ModelStore,
    models: BTreeMap<TargetParameter, TrainedModel>,
    metrics: PipelineMetrics,
    clock: Arc<dyn Clock>,
}

impl OceanPredictor {
    /// Create an untrained predictor. The model family is resolved here,
    /// so a fallback warning is emitted once per predictor.
    pub fn new(region_key: impl Into<String>, settings: ModelSettings, model_root: &Path) -> Self {
        let region_key = region_key.into();
        let family = ModelFamily::resolve(&settings.preference);
        info!(region = %region_key, family = %family, "Predictor initialized");

        Self {
            store: ModelStore::new(model_root, &region_key),
            region_key,
            family,
            settings,
            encoder: FeatureEncoder::new(),
            models: BTreeMap::new(),
            metrics: PipelineMetrics::new(),
            clock: system_clock(),
        }
    }

    /// Stamp persisted metadata with this clock instead of the system time
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn region_key(&self) -> &str {
        &self.region_key
    }

    pub fn family(&self) -> ModelFamily {
        self.family
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    pub fn state(&self) -> PredictorState {
        if self.models.is_empty() {
            PredictorState::Untrained
        } else {
            PredictorState::Trained
        }
    }

    pub fn trained_parameters(&self) -> Vec<TargetParameter> {
        self.models.keys().copied().collect()
    }

    /// Train every parameter the dataset supports and persist the result.
    /// The current models are replaced only if at least one parameter trains.
    pub fn train(&mut self, dataset: &CleanedDataset) -> TrainingReport {
        let started = Instant::now();
        let mut trained = BTreeMap::new();
        let mut skipped = Vec::new();

        for parameter in TargetParameter::ALL {
            match self.train_parameter(dataset, parameter) {
                Ok(model) => {
                    info!(
                        region = %self.region_key,
                        parameter = %parameter,
                        mae = model.metrics.mae,
                        r2 = model.metrics.r2,
                        model_type = %model.metrics.model_type,
                        "Model trained"
                    );
                    trained.insert(parameter, model);
                }
                Err(reason) => {
                    warn!(
                        region = %self.region_key,
                        parameter = %parameter,
                        reason = %reason,
                        "Skipping parameter"
                    );
                    skipped.push((parameter, reason));
                }
            }
        }

        self.metrics
            .observe_training_duration(started.elapsed().as_secs_f64());

        if trained.is_empty() {
            warn!(region = %self.region_key, "No parameter could be trained");
            return TrainingReport {
                trained: Vec::new(),
                skipped,
                persisted: false,
            };
        }

        self.metrics.add_models_trained(trained.len());
        let persisted = self.store.save(&trained, self.clock.now());
        if !persisted {
            self.metrics.inc_persistence_failure("model_store");
        }

        let report = TrainingReport {
            trained: trained.keys().copied().collect(),
            skipped,
            persisted,
        };
        self.models = trained;
        report
    }

    fn train_parameter(
        &self,
        dataset: &CleanedDataset,
        parameter: TargetParameter,
    ) -> Result<TrainedModel, SkipReason> {
        let mut rows: Vec<[f64; N]> = Vec::with_capacity(dataset.len());
        let mut targets = Vec::with_capacity(dataset.len());
        for record in dataset.records() {
            let features = self.encoder.encode_record(record);
            let target = record.target(parameter);
            if features.is_finite() && target.is_finite() {
                rows.push(features.to_array());
                targets.push(target);
            }
        }

        if rows.len() < MIN_TRAINING_ROWS {
            return Err(SkipReason::InsufficientData { rows: rows.len() });
        }

        let scaler = FeatureScaler::fit(&rows);
        let scaled = scaler.transform_all(&rows);
        let (train_idx, test_idx) =
            train_test_split(scaled.len(), self.settings.test_size, self.settings.random_state);

        let pick = |idx: &[usize]| -> (Vec<[f64; N]>, Vec<f64>) {
            idx.iter().map(|&i| (scaled[i], targets[i])).unzip()
        };
        let (x_train, y_train) = pick(&train_idx);
        let (x_test, y_test) = pick(&test_idx);

        debug!(
            region = %self.region_key,
            parameter = %parameter,
            train_rows = x_train.len(),
            test_rows = x_test.len(),
            "Fitting model"
        );

        let model = FittedModel::fit(self.family, &x_train, &y_train, &self.settings)
            .map_err(|e| SkipReason::FitFailed(e.to_string()))?;
        let y_pred = model
            .predict(&x_test)
            .map_err(|e| SkipReason::FitFailed(e.to_string()))?;

        let metrics = ModelMetrics {
            mae: round_to(mean_absolute_error(&y_test, &y_pred), 3),
            r2: round_to(r2_score(&y_test, &y_pred), 3),
            model_type: self.family.label().to_string(),
        };

        let feature_importance = if self.family.exposes_importance() {
            match permutation_importance(&model, &x_test, &y_test, self.settings.random_state) {
                Ok(scores) => Some(scores),
                Err(e) => {
                    warn!(parameter = %parameter, error = %e, "Feature importance unavailable");
                    None
                }
            }
        } else {
            None
        };

        Ok(TrainedModel {
            model,
            scaler,
            metrics,
            feature_importance,
        })
    }

    /// Restore persisted models. Missing or damaged pairs are skipped.
    pub fn load(&mut self) -> LoadOutcome {
        let Some(metadata) = self.store.read_metadata() else {
            return LoadOutcome::NotFound;
        };

        let mut loaded = BTreeMap::new();
        for parameter in TargetParameter::ALL {
            let Some(metrics) = metadata.metrics.get(&parameter) else {
                continue;
            };
            if let Some((artifact, scaler)) = self.store.load_pair(parameter, &metadata) {
                loaded.insert(
                    parameter,
                    TrainedModel {
                        model: artifact.model,
                        scaler,
                        metrics: metrics.clone(),
                        feature_importance: artifact.feature_importance,
                    },
                );
            }
        }

        if loaded.is_empty() {
            warn!(region = %self.region_key, "Model metadata present but no usable models");
            return LoadOutcome::NoUsableModels;
        }

        let parameters: Vec<TargetParameter> = loaded.keys().copied().collect();
        info!(
            region = %self.region_key,
            parameters = ?parameters,
            trained_date = %metadata.trained_date,
            "Models loaded"
        );
        self.models = loaded;
        LoadOutcome::Loaded { parameters }
    }

    /// Importance scores for one parameter, if its family exposes them
    pub fn feature_importance(&self, parameter: TargetParameter) -> Option<&[FeatureImportance]> {
        self.models
            .get(&parameter)?
            .feature_importance
            .as_deref()
    }

    fn predict_inner(
        &self,
        latitude: f64,
        longitude: f64,
        depth: f64,
        month: u32,
    ) -> Result<Prediction, PredictError> {
        if self.models.is_empty() {
            return Err(PredictError::NotReady {
                region: self.region_key.clone(),
            });
        }

        let features = self
            .encoder
            .encode(latitude, longitude, depth, month as f64);
        if !features.is_finite() {
            return Err(PredictError::InvalidInput(format!(
                "lat={}, lon={}, depth={}, month={}",
                latitude, longitude, depth, month
            )));
        }
        let row = features.to_array();

        let mut prediction = Prediction::new();
        for (parameter, trained) in &self.models {
            let scaled = trained.scaler.transform(&row);
            let value = trained
                .model
                .predict(&[scaled])
                .map_err(|e| PredictError::Model {
                    parameter: parameter.to_string(),
                    message: e.to_string(),
                })?
                .first()
                .copied()
                .ok_or_else(|| PredictError::Model {
                    parameter: parameter.to_string(),
                    message: "empty model output".to_string(),
                })?;

            prediction.insert(
                *parameter,
                ParameterEstimate {
                    value: round_to(value, 2),
                    confidence: trained.metrics.r2,
                },
            );
        }
        Ok(prediction)
    }
}

impl Predictor for OceanPredictor {
    fn predict(
        &self,
        latitude: f64,
        longitude: f64,
        depth: f64,
        month: u32,
    ) -> Result<Prediction, PredictError> {
        let result = self.predict_inner(latitude, longitude, depth, month);
        match &result {
            Ok(_) => self.metrics.inc_predictions_served(),
            Err(_) => self.metrics.inc_prediction_errors(),
        }
        result
    }

    fn is_ready(&self) -> bool {
        self.state() == PredictorState::Trained
    }

    fn model_metrics(&self) -> BTreeMap<TargetParameter, ModelMetrics> {
        self.models
            .iter()
            .map(|(p, m)| (*p, m.metrics.clone()))
            .collect()
    }
}
