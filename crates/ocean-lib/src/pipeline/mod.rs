//! Region pipeline orchestration
//!
//! A `RegionPipeline` sequences one region's run: restore models, take the
//! dataset from the cache or the fetcher, then train if nothing was
//! restored. Runs for one region must be serialised by the caller; the
//! registry hands out one mutex-guarded pipeline per region key.

mod registry;

pub use registry::PipelineRegistry;

use crate::cache::{CacheInfo, DataCache};
use crate::error::PipelineError;
use crate::fetcher::{clean, MultiStrategyFetcher};
use crate::models::{CleanedDataset, ModelMetrics, RegionSpec, TargetParameter};
use crate::observability::{PipelineMetrics, StructuredLogger};
use crate::predictor::{
    FeatureImportance, LoadOutcome, OceanPredictor, Prediction, Predictor, TrainingReport,
};
use crate::settings::Settings;
use crate::summary::DatasetSummary;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Where a run's dataset came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Cache,
    Upstream,
    /// Fetched, but at least one year fell back to synthetic profiles
    PartlySynthetic,
    /// Every year fell back to synthetic profiles
    Synthetic,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Cache => "cache",
            DataSource::Upstream => "upstream",
            DataSource::PartlySynthetic => "partly_synthetic",
            DataSource::Synthetic => "synthetic",
        }
    }
}

/// How the models of a run became ready, if they did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSource {
    Loaded,
    Trained,
    Unavailable,
}

/// Outcome of one successful pipeline run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineReport {
    pub region_key: String,
    pub source: DataSource,
    pub records: usize,
    pub summary: Option<DatasetSummary>,
    pub metrics: BTreeMap<TargetParameter, ModelMetrics>,
    pub models: ModelSource,
    pub models_ready: bool,
}

/// Pipeline state for one region
pub struct RegionPipeline {
    region: RegionSpec,
    settings: Arc<Settings>,
    fetcher: MultiStrategyFetcher,
    cache: DataCache,
    predictor: OceanPredictor,
    dataset: CleanedDataset,
    summary: Option<DatasetSummary>,
    source: Option<DataSource>,
    logger: StructuredLogger,
    metrics: PipelineMetrics,
}

impl RegionPipeline {
    pub fn new(
        region: RegionSpec,
        settings: Arc<Settings>,
        fetcher: MultiStrategyFetcher,
        cache: DataCache,
        logger: StructuredLogger,
    ) -> Self {
        let predictor = OceanPredictor::new(
            region.key.clone(),
            settings.model.clone(),
            &settings.storage.model_dir,
        )
        .with_clock(cache.clock());

        Self {
            region,
            settings,
            fetcher,
            cache,
            predictor,
            dataset: CleanedDataset::default(),
            summary: None,
            source: None,
            logger,
            metrics: PipelineMetrics::new(),
        }
    }

    pub fn region(&self) -> &RegionSpec {
        &self.region
    }

    pub fn key(&self) -> &str {
        &self.region.key
    }

    /// Run the full pipeline. Fails only when no usable data exists after
    /// every fallback; training shortfalls are reported, not raised.
    pub async fn run(&mut self) -> Result<PipelineReport, PipelineError> {
        let key = self.region.key.clone();
        self.logger.log_pipeline_started(&key);

        let mut model_source = ModelSource::Unavailable;
        if let LoadOutcome::Loaded { parameters } = self.predictor.load() {
            let names: Vec<String> = parameters.iter().map(|p| p.to_string()).collect();
            self.logger.log_models_loaded(&key, &names);
            model_source = ModelSource::Loaded;
        }

        let (dataset, summary, source) = match self.load_cached() {
            Some(hit) => hit,
            None => match self.fetch_fresh().await {
                Some(fresh) => fresh,
                None => {
                    let err = PipelineError::NoUsableData(key.clone());
                    self.logger.log_pipeline_failed(&key, &err.to_string());
                    return Err(err);
                }
            },
        };
        self.logger.log_data_loaded(
            &key,
            if source == DataSource::Cache { "cache" } else { "fetch" },
            dataset.len(),
            matches!(source, DataSource::Synthetic | DataSource::PartlySynthetic),
        );

        self.dataset = dataset;
        self.summary = summary;
        self.source = Some(source);

        if !self.predictor.is_ready() {
            let report = self.predictor.train(&self.dataset);
            self.log_training(&report);
            if report.is_success() {
                model_source = ModelSource::Trained;
            }
        }

        Ok(PipelineReport {
            region_key: key,
            source,
            records: self.dataset.len(),
            summary: self.summary.clone(),
            metrics: self.predictor.model_metrics(),
            models: model_source,
            models_ready: self.predictor.is_ready(),
        })
    }

    fn load_cached(&self) -> Option<(CleanedDataset, Option<DatasetSummary>, DataSource)> {
        let snapshot = match self.cache.load(&self.region.key) {
            Some(snapshot) if !snapshot.dataset.is_empty() => snapshot,
            _ => {
                self.metrics.inc_cache_miss();
                return None;
            }
        };
        self.metrics.inc_cache_hit();

        let summary = snapshot
            .summary
            .or_else(|| DatasetSummary::from_dataset(&self.region.name, &snapshot.dataset));
        Some((snapshot.dataset, summary, DataSource::Cache))
    }

    async fn fetch_fresh(&self) -> Option<(CleanedDataset, Option<DatasetSummary>, DataSource)> {
        let data = &self.settings.data;
        let result = self.fetcher.fetch(&self.region, &data.years, &data.months).await;

        let dataset = clean(&result.table);
        if dataset.is_empty() {
            debug!(region = %self.region.key, raw_rows = result.table.len(), "Nothing survived cleaning");
            return None;
        }

        let source = if result.is_synthetic_only() {
            DataSource::Synthetic
        } else if result.used_synthetic() {
            DataSource::PartlySynthetic
        } else {
            DataSource::Upstream
        };

        let summary = DatasetSummary::from_dataset(&self.region.name, &dataset);
        if let Some(summary) = &summary {
            if self.cache.save(&self.region.key, &dataset, summary) {
                self.logger.log_cache_written(&self.region.key, dataset.len());
            } else {
                self.metrics.inc_persistence_failure("cache");
                self.logger.log_cache_write_failed(&self.region.key);
            }
        }

        Some((dataset, summary, source))
    }

    fn log_training(&self, report: &TrainingReport) {
        let trained: Vec<String> = report.trained.iter().map(|p| p.to_string()).collect();
        let skipped: Vec<String> = report
            .skipped
            .iter()
            .map(|(p, reason)| format!("{}: {}", p, reason))
            .collect();
        self.logger.log_models_trained(
            &self.region.key,
            &self.predictor.family().to_string(),
            &trained,
            &skipped,
            report.persisted,
        );
    }

    /// Retrain on the current dataset, replacing models on success
    pub fn retrain(&mut self) -> TrainingReport {
        let report = self.predictor.train(&self.dataset);
        self.log_training(&report);
        report
    }

    pub fn predict(
        &self,
        latitude: f64,
        longitude: f64,
        depth: f64,
        month: u32,
    ) -> Result<Prediction, PipelineError> {
        let prediction = self
            .predictor
            .predict(latitude, longitude, depth, month)
            .map_err(PipelineError::from)?;

        let parameters: Vec<String> = prediction.parameters().map(|p| p.to_string()).collect();
        self.logger
            .log_prediction(&self.region.key, latitude, longitude, depth, month, &parameters);
        Ok(prediction)
    }

    /// Restore persisted models without touching data
    pub fn load_models(&mut self) -> LoadOutcome {
        self.predictor.load()
    }

    pub fn is_ready(&self) -> bool {
        self.predictor.is_ready()
    }

    pub fn dataset(&self) -> &CleanedDataset {
        &self.dataset
    }

    pub fn summary(&self) -> Option<&DatasetSummary> {
        self.summary.as_ref()
    }

    pub fn data_source(&self) -> Option<DataSource> {
        self.source
    }

    pub fn model_metrics(&self) -> BTreeMap<TargetParameter, ModelMetrics> {
        self.predictor.model_metrics()
    }

    /// Best-effort importance scores; `None` when the family has none
    pub fn feature_importance(&self, parameter: TargetParameter) -> Option<Vec<FeatureImportance>> {
        self.predictor
            .feature_importance(parameter)
            .map(|scores| scores.to_vec())
    }

    pub fn cache_info(&self) -> CacheInfo {
        self.cache.info(&self.region.key)
    }

    pub fn clear_cache(&self) {
        self.cache.clear(&self.region.key);
    }
}
