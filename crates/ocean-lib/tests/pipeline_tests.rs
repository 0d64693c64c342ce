//! End-to-end pipeline tests against scripted observation sources

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{Datelike, Duration, TimeZone, Utc};
use ocean_lib::cache::DataCache;
use ocean_lib::clock::{Clock, ManualClock};
use ocean_lib::fetcher::{
    clean, ObservationSource, RawTable, SyntheticGenerator, WindowRequest, MIN_SALINITY,
    MIN_TEMPERATURE,
};
use ocean_lib::predictor::{LoadOutcome, OceanPredictor, Predictor};
use ocean_lib::{
    DataSource, DatasetSummary, ModelSource, PipelineRegistry, Settings, TargetParameter,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Serves seeded profiles for the month a window starts in
struct ReplaySource {
    generator: SyntheticGenerator,
    calls: AtomicUsize,
}

impl ReplaySource {
    fn new(seed: u64) -> Self {
        Self {
            generator: SyntheticGenerator::seeded(seed),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ObservationSource for ReplaySource {
    fn name(&self) -> &str {
        "replay"
    }

    async fn fetch_window(&self, request: &WindowRequest) -> Result<RawTable> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let start = request.window.start;
        Ok(self
            .generator
            .generate(&request.bounds, start.year(), &[start.month()]))
    }
}

struct OfflineSource;

#[async_trait]
impl ObservationSource for OfflineSource {
    fn name(&self) -> &str {
        "offline"
    }

    async fn fetch_window(&self, _request: &WindowRequest) -> Result<RawTable> {
        bail!("connection refused")
    }
}

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap()))
}

fn settings(temp_dir: &TempDir) -> Settings {
    Settings::default().with_storage_root(temp_dir.path())
}

fn is_rounded(value: f64) -> bool {
    ((value * 100.0).round() / 100.0 - value).abs() < 1e-9
}

#[tokio::test]
async fn test_fresh_run_trains_and_predicts() {
    let temp_dir = TempDir::new().unwrap();
    let source = Arc::new(ReplaySource::new(7));
    let registry = PipelineRegistry::new(settings(&temp_dir), source.clone(), clock());

    let pipeline = registry.get_or_create("arabian_sea").unwrap();
    let mut pipeline = pipeline.lock().await;

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.source, DataSource::Upstream);
    assert_eq!(report.models, ModelSource::Trained);
    assert!(report.models_ready);
    assert!(report.records > 200);
    assert_eq!(report.metrics.len(), 2);
    // Two years, three monthly windows each
    assert_eq!(source.calls.load(Ordering::SeqCst), 6);

    let summary = report.summary.expect("summary");
    assert_eq!(summary.region, "Arabian Sea");
    assert!(summary.num_profiles > 0);

    let prediction = pipeline.predict(15.0, 65.0, 50.0, 7).unwrap();
    let temperature = prediction.value(TargetParameter::Temperature).unwrap();
    let salinity = prediction.value(TargetParameter::Salinity).unwrap();
    assert!(is_rounded(temperature));
    assert!(is_rounded(salinity));
    assert!(temperature > 0.0 && temperature < 40.0);

    let map = prediction.to_map();
    assert!(map.contains_key("predicted_temperature"));
    assert!(map.contains_key("salinity_confidence"));
}

#[tokio::test]
async fn test_second_run_uses_cache_and_stored_models() {
    let temp_dir = TempDir::new().unwrap();
    let clock = clock();

    let first = {
        let registry =
            PipelineRegistry::new(settings(&temp_dir), Arc::new(ReplaySource::new(11)), clock.clone());
        let pipeline = registry.get_or_create("bay_of_bengal").unwrap();
        let mut pipeline = pipeline.lock().await;
        pipeline.run().await.unwrap();
        let prediction = pipeline.predict(15.0, 88.0, 100.0, 7).unwrap();
        prediction
    };

    let source = Arc::new(ReplaySource::new(99));
    let registry = PipelineRegistry::new(settings(&temp_dir), source.clone(), clock);
    let pipeline = registry.get_or_create("bay_of_bengal").unwrap();
    let mut pipeline = pipeline.lock().await;

    let report = pipeline.run().await.unwrap();
    assert_eq!(report.source, DataSource::Cache);
    assert_eq!(report.models, ModelSource::Loaded);
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);

    let second = pipeline.predict(15.0, 88.0, 100.0, 7).unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_offline_source_falls_back_to_synthetic() {
    let temp_dir = TempDir::new().unwrap();
    let registry = PipelineRegistry::new(settings(&temp_dir), Arc::new(OfflineSource), clock())
        .with_synthetic_seed(42);

    let pipeline = registry.get_or_create("north_indian_ocean").unwrap();
    let mut pipeline = pipeline.lock().await;
    let report = pipeline.run().await.unwrap();

    assert_eq!(report.source, DataSource::Synthetic);
    assert!(report.models_ready);

    let bounds = pipeline.region().bounds;
    for record in pipeline.dataset().records() {
        assert!(record.temperature >= MIN_TEMPERATURE);
        assert!(record.salinity >= MIN_SALINITY);
        assert!(bounds.contains(record.latitude, record.longitude));
        assert!([2022, 2024].contains(&record.year));
    }
}

#[tokio::test]
async fn test_predict_before_run_is_not_ready() {
    let temp_dir = TempDir::new().unwrap();
    let registry = PipelineRegistry::new(settings(&temp_dir), Arc::new(OfflineSource), clock());

    let pipeline = registry.get_or_create("arabian_sea").unwrap();
    let pipeline = pipeline.lock().await;
    let err = pipeline.predict(15.0, 65.0, 50.0, 7).unwrap_err();
    assert!(err.is_not_ready());
}

fn dataset(seed: u64) -> ocean_lib::CleanedDataset {
    let settings = Settings::default();
    let region = settings.region("arabian_sea").unwrap();
    let generator = SyntheticGenerator::seeded(seed);
    let mut table = generator.generate(&region.bounds, 2024, &[6, 7, 8]);
    for _ in 0..4 {
        table.append(generator.generate(&region.bounds, 2022, &[6, 7, 8]));
    }
    clean(&table)
}

#[test]
fn test_two_hundred_records_train_both_parameters() {
    let data = dataset(21);
    let data = ocean_lib::CleanedDataset::new(data.records()[..200].to_vec());
    let temp_dir = TempDir::new().unwrap();

    let mut predictor =
        OceanPredictor::new("arabian_sea", Settings::default().model, temp_dir.path());
    let report = predictor.train(&data);
    assert_eq!(
        report.trained,
        vec![TargetParameter::Temperature, TargetParameter::Salinity]
    );

    let metrics = predictor.model_metrics();
    for parameter in TargetParameter::ALL {
        let m = &metrics[&parameter];
        assert!(m.r2.is_finite());
        assert!(m.mae >= 0.0);
    }

    let map = predictor.predict(15.0, 65.0, 50.0, 7).unwrap().to_map();
    for key in ["predicted_temperature", "predicted_salinity"] {
        assert!(map[key].is_finite());
        assert!(is_rounded(map[key]));
    }
}

#[test]
fn test_training_is_deterministic() {
    let data = dataset(3);
    let settings = Settings::default();
    let first_dir = TempDir::new().unwrap();
    let second_dir = TempDir::new().unwrap();

    let mut first = OceanPredictor::new("arabian_sea", settings.model.clone(), first_dir.path());
    let mut second = OceanPredictor::new("arabian_sea", settings.model.clone(), second_dir.path());
    assert!(first.train(&data).is_success());
    assert!(second.train(&data).is_success());

    assert_eq!(first.model_metrics(), second.model_metrics());
    assert_eq!(
        first.predict(12.0, 60.0, 250.0, 6).unwrap(),
        second.predict(12.0, 60.0, 250.0, 6).unwrap()
    );
}

#[test]
fn test_missing_salinity_scaler_loads_temperature_only() {
    let data = dataset(5);
    let settings = Settings::default();
    let temp_dir = TempDir::new().unwrap();

    let mut trained = OceanPredictor::new("arabian_sea", settings.model.clone(), temp_dir.path());
    assert!(trained.train(&data).persisted);
    std::fs::remove_file(trained.store().scaler_path(TargetParameter::Salinity)).unwrap();

    let mut restored = OceanPredictor::new("arabian_sea", settings.model.clone(), temp_dir.path());
    assert_eq!(
        restored.load(),
        LoadOutcome::Loaded {
            parameters: vec![TargetParameter::Temperature]
        }
    );

    let prediction = restored.predict(12.0, 60.0, 250.0, 6).unwrap();
    assert!(prediction.value(TargetParameter::Temperature).is_some());
    assert!(prediction.value(TargetParameter::Salinity).is_none());
}

#[test]
fn test_cache_expires_and_clears() {
    let temp_dir = TempDir::new().unwrap();
    let clock = clock();
    let cache = DataCache::new(temp_dir.path(), 7, clock.clone() as Arc<dyn Clock>);

    let data = dataset(8);
    let summary = DatasetSummary::from_dataset("Arabian Sea", &data).unwrap();
    assert!(cache.save("arabian_sea", &data, &summary));
    assert!(cache.is_valid("arabian_sea"));

    let snapshot = cache.load("arabian_sea").unwrap();
    assert_eq!(snapshot.dataset, data);
    assert_eq!(snapshot.summary, Some(summary.clone()));

    clock.advance(Duration::days(7) + Duration::seconds(1));
    assert!(!cache.is_valid("arabian_sea"));
    assert!(cache.load("arabian_sea").is_none());
    let info = cache.info("arabian_sea");
    assert!(info.cached && !info.valid);

    clock.set(Utc.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap());
    assert!(cache.is_valid("arabian_sea"));
    cache.clear("arabian_sea");
    assert!(!cache.is_valid("arabian_sea"));
    assert!(!cache.info("arabian_sea").cached);
}
