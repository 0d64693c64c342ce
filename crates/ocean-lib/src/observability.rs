//! Observability infrastructure for the ocean pipeline
//!
//! Provides:
//! - Prometheus metrics (fetch latency and outcomes, cache hits, training, predictions)
//! - Structured logging of pipeline milestones with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Histogram buckets for upstream fetch latency (in seconds)
const FETCH_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Histogram buckets for model training duration (in seconds)
const TRAINING_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 120.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<PipelineMetricsInner> = OnceLock::new();

struct PipelineMetricsInner {
    fetch_latency_seconds: Histogram,
    fetch_strategy_outcomes: IntCounterVec,
    records_fetched: IntCounter,
    cache_hits: IntCounter,
    cache_misses: IntCounter,
    training_duration_seconds: Histogram,
    models_trained: IntCounter,
    predictions_served: IntCounter,
    prediction_errors: IntCounter,
    persistence_failures: IntCounterVec,
}

impl PipelineMetricsInner {
    fn new() -> Self {
        Self {
            fetch_latency_seconds: register_histogram!(
                "ocean_fetch_latency_seconds",
                "Time spent fetching one observation window from upstream",
                FETCH_BUCKETS.to_vec()
            )
            .expect("Failed to register fetch_latency_seconds"),

            fetch_strategy_outcomes: register_int_counter_vec!(
                "ocean_fetch_strategy_outcomes_total",
                "Fetch strategy results per year",
                &["strategy", "outcome"]
            )
            .expect("Failed to register fetch_strategy_outcomes"),

            records_fetched: register_int_counter!(
                "ocean_records_fetched_total",
                "Raw observation rows returned by all fetch strategies"
            )
            .expect("Failed to register records_fetched"),

            cache_hits: register_int_counter!(
                "ocean_cache_hits_total",
                "Pipeline runs served from the data cache"
            )
            .expect("Failed to register cache_hits"),

            cache_misses: register_int_counter!(
                "ocean_cache_misses_total",
                "Pipeline runs that had to fetch fresh data"
            )
            .expect("Failed to register cache_misses"),

            training_duration_seconds: register_histogram!(
                "ocean_training_duration_seconds",
                "Time spent training the model set for one region",
                TRAINING_BUCKETS.to_vec()
            )
            .expect("Failed to register training_duration_seconds"),

            models_trained: register_int_counter!(
                "ocean_models_trained_total",
                "Per-parameter models fitted"
            )
            .expect("Failed to register models_trained"),

            predictions_served: register_int_counter!(
                "ocean_predictions_served_total",
                "Point predictions returned"
            )
            .expect("Failed to register predictions_served"),

            prediction_errors: register_int_counter!(
                "ocean_prediction_errors_total",
                "Point predictions that failed"
            )
            .expect("Failed to register prediction_errors"),

            persistence_failures: register_int_counter_vec!(
                "ocean_persistence_failures_total",
                "Disk write failures swallowed by the cache and model store",
                &["store"]
            )
            .expect("Failed to register persistence_failures"),
        }
    }
}

/// Pipeline metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct PipelineMetrics {
    _private: (),
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PipelineMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PipelineMetrics")
    }
}

impl PipelineMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(PipelineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &PipelineMetricsInner {
        GLOBAL_METRICS.get_or_init(PipelineMetricsInner::new)
    }

    pub fn observe_fetch_latency(&self, duration_secs: f64) {
        self.inner().fetch_latency_seconds.observe(duration_secs);
    }

    pub fn inc_strategy_outcome(&self, strategy: &str, outcome: &str) {
        self.inner()
            .fetch_strategy_outcomes
            .with_label_values(&[strategy, outcome])
            .inc();
    }

    pub fn add_records_fetched(&self, count: usize) {
        self.inner().records_fetched.inc_by(count as u64);
    }

    pub fn inc_cache_hit(&self) {
        self.inner().cache_hits.inc();
    }

    pub fn inc_cache_miss(&self) {
        self.inner().cache_misses.inc();
    }

    pub fn observe_training_duration(&self, duration_secs: f64) {
        self.inner().training_duration_seconds.observe(duration_secs);
    }

    pub fn add_models_trained(&self, count: usize) {
        self.inner().models_trained.inc_by(count as u64);
    }

    pub fn inc_predictions_served(&self) {
        self.inner().predictions_served.inc();
    }

    pub fn inc_prediction_errors(&self) {
        self.inner().prediction_errors.inc();
    }

    /// `store` is `cache` or `model_store`
    pub fn inc_persistence_failure(&self, store: &str) {
        self.inner()
            .persistence_failures
            .with_label_values(&[store])
            .inc();
    }
}

/// Structured logger for pipeline milestones
///
/// Every event carries an `event` field so log pipelines can filter on it.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    pub fn log_startup(&self, version: &str, warm_regions: &[String]) {
        info!(
            event = "startup",
            node = %self.node_name,
            version = %version,
            warm_regions = ?warm_regions,
            "Ocean agent starting"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "shutdown",
            node = %self.node_name,
            reason = %reason,
            "Ocean agent shutting down"
        );
    }

    pub fn log_pipeline_started(&self, region: &str) {
        info!(
            event = "pipeline_started",
            node = %self.node_name,
            region = %region,
            "Pipeline run started"
        );
    }

    /// `source` is `cache` or `fetch`
    pub fn log_data_loaded(&self, region: &str, source: &str, records: usize, synthetic: bool) {
        info!(
            event = "data_loaded",
            node = %self.node_name,
            region = %region,
            source = %source,
            records = records,
            synthetic = synthetic,
            "Observation data ready"
        );
    }

    pub fn log_fetch_strategy_result(
        &self,
        region: &str,
        year: i32,
        strategy: &str,
        outcome: &str,
        records: usize,
    ) {
        if outcome == "failed" {
            warn!(
                event = "fetch_strategy_result",
                node = %self.node_name,
                region = %region,
                year = year,
                strategy = %strategy,
                outcome = %outcome,
                records = records,
                "Fetch strategy failed, trying next"
            );
        } else {
            info!(
                event = "fetch_strategy_result",
                node = %self.node_name,
                region = %region,
                year = year,
                strategy = %strategy,
                outcome = %outcome,
                records = records,
                "Fetch strategy finished"
            );
        }
    }

    pub fn log_models_trained(
        &self,
        region: &str,
        family: &str,
        trained: &[String],
        skipped: &[String],
        persisted: bool,
    ) {
        info!(
            event = "models_trained",
            node = %self.node_name,
            region = %region,
            family = %family,
            trained = ?trained,
            skipped = ?skipped,
            persisted = persisted,
            "Model training finished"
        );
    }

    pub fn log_models_loaded(&self, region: &str, parameters: &[String]) {
        info!(
            event = "models_loaded",
            node = %self.node_name,
            region = %region,
            parameters = ?parameters,
            "Loaded persisted models"
        );
    }

    pub fn log_prediction(
        &self,
        region: &str,
        latitude: f64,
        longitude: f64,
        depth: f64,
        month: u32,
        parameters: &[String],
    ) {
        info!(
            event = "prediction_generated",
            node = %self.node_name,
            region = %region,
            latitude = latitude,
            longitude = longitude,
            depth = depth,
            month = month,
            parameters = ?parameters,
            "Generated point prediction"
        );
    }

    pub fn log_cache_written(&self, region: &str, records: usize) {
        info!(
            event = "cache_written",
            node = %self.node_name,
            region = %region,
            records = records,
            "Cached cleaned dataset"
        );
    }

    pub fn log_cache_write_failed(&self, region: &str) {
        warn!(
            event = "cache_write_failed",
            node = %self.node_name,
            region = %region,
            "Cache write failed, continuing without cache"
        );
    }

    pub fn log_pipeline_failed(&self, region: &str, reason: &str) {
        error!(
            event = "pipeline_failed",
            node = %self.node_name,
            region = %region,
            reason = %reason,
            "Pipeline run failed"
        );
    }
}
