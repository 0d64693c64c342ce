//! Region-keyed pipeline registry
//!
//! Owned by whoever serves requests and passed around by reference. The
//! first access for a key creates its pipeline; concurrent first accesses
//! for the same key still create exactly one.

use super::RegionPipeline;
use crate::cache::DataCache;
use crate::clock::{system_clock, Clock};
use crate::error::PipelineError;
use crate::fetcher::{ErddapSource, MultiStrategyFetcher, ObservationSource, SyntheticGenerator};
use crate::models::RegionSpec;
use crate::observability::StructuredLogger;
use crate::settings::Settings;
use anyhow::Result;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

pub struct PipelineRegistry {
    settings: Arc<Settings>,
    source: Arc<dyn ObservationSource>,
    clock: Arc<dyn Clock>,
    cache: DataCache,
    logger: StructuredLogger,
    synthetic_seed: Option<u64>,
    pipelines: DashMap<String, Arc<Mutex<RegionPipeline>>>,
}

impl PipelineRegistry {
    pub fn new(settings: Settings, source: Arc<dyn ObservationSource>, clock: Arc<dyn Clock>) -> Self {
        let cache = DataCache::new(
            settings.storage.cache_dir.clone(),
            settings.storage.cache_expiry_days,
            clock.clone(),
        );

        Self {
            settings: Arc::new(settings),
            source,
            clock,
            cache,
            logger: StructuredLogger::new("local"),
            synthetic_seed: None,
            pipelines: DashMap::new(),
        }
    }

    /// Registry backed by the configured ERDDAP endpoint and the system clock
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let source = ErddapSource::new(
            &settings.data.upstream_url,
            Duration::from_secs(settings.data.request_timeout_secs),
        )?;
        Ok(Self::new(settings, Arc::new(source), system_clock()))
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Seed synthetic fallback data for reproducible runs
    pub fn with_synthetic_seed(mut self, seed: u64) -> Self {
        self.synthetic_seed = Some(seed);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn cache(&self) -> &DataCache {
        &self.cache
    }

    /// Pipeline for `region_key`, created on first access
    pub fn get_or_create(&self, region_key: &str) -> Result<Arc<Mutex<RegionPipeline>>, PipelineError> {
        if let Some(existing) = self.pipelines.get(region_key) {
            return Ok(existing.value().clone());
        }

        let region = self
            .settings
            .region(region_key)
            .cloned()
            .ok_or_else(|| PipelineError::UnknownRegion(region_key.to_string()))?;

        // The entry holds its shard lock while the closure runs
        let entry = self
            .pipelines
            .entry(region_key.to_string())
            .or_insert_with(|| {
                info!(region = %region_key, "Creating region pipeline");
                Arc::new(Mutex::new(self.build(region)))
            });
        Ok(entry.value().clone())
    }

    /// Existing pipeline, without creating one
    pub fn get(&self, region_key: &str) -> Option<Arc<Mutex<RegionPipeline>>> {
        self.pipelines.get(region_key).map(|p| p.value().clone())
    }

    /// Keys with a live pipeline, sorted
    pub fn active_regions(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.pipelines.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    fn build(&self, region: RegionSpec) -> RegionPipeline {
        let mut fetcher = MultiStrategyFetcher::new(
            self.source.clone(),
            self.settings.data.max_depth,
            self.clock.clone(),
        )
        .with_logger(self.logger.clone());
        if let Some(seed) = self.synthetic_seed {
            fetcher = fetcher.with_synthetic(SyntheticGenerator::seeded(seed));
        }

        RegionPipeline::new(
            region,
            self.settings.clone(),
            fetcher,
            self.cache.clone(),
            self.logger.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::{RawTable, WindowRequest};
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct EmptySource;

    #[async_trait]
    impl ObservationSource for EmptySource {
        fn name(&self) -> &str {
            "empty"
        }

        async fn fetch_window(&self, _request: &WindowRequest) -> Result<RawTable> {
            Ok(RawTable::default())
        }
    }

    fn registry(temp_dir: &TempDir) -> Arc<PipelineRegistry> {
        let settings = Settings::default().with_storage_root(temp_dir.path());
        Arc::new(PipelineRegistry::new(settings, Arc::new(EmptySource), system_clock()))
    }

    #[tokio::test]
    async fn test_unknown_region_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let registry = registry(&temp_dir);

        match registry.get_or_create("atlantis") {
            Err(PipelineError::UnknownRegion(key)) => assert_eq!(key, "atlantis"),
            other => panic!("expected UnknownRegion, got {:?}", other.map(|_| ())),
        }
        assert!(registry.active_regions().is_empty());
    }

    #[tokio::test]
    async fn test_same_key_returns_same_pipeline() {
        let temp_dir = TempDir::new().unwrap();
        let registry = registry(&temp_dir);

        let a = registry.get_or_create("arabian_sea").unwrap();
        let b = registry.get_or_create("arabian_sea").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(registry.get("bay_of_bengal").is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_access_creates_one_pipeline() {
        let temp_dir = TempDir::new().unwrap();
        let registry = registry(&temp_dir);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.get_or_create("bay_of_bengal").unwrap() })
            })
            .collect();

        let mut pipelines = Vec::new();
        for handle in handles {
            pipelines.push(handle.await.unwrap());
        }
        assert!(pipelines.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(registry.active_regions(), vec!["bay_of_bengal".to_string()]);
    }

    #[tokio::test]
    async fn test_pipeline_carries_region_spec() {
        let temp_dir = TempDir::new().unwrap();
        let registry = registry(&temp_dir);

        let pipeline = registry.get_or_create("north_indian_ocean").unwrap();
        let guard = pipeline.lock().await;
        assert_eq!(guard.key(), "north_indian_ocean");
        assert_eq!(guard.region().name, "North Indian Ocean");
        assert!(!guard.is_ready());
    }
}
