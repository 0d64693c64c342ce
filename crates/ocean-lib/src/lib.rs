//! Ocean observation pipeline library
//!
//! This crate provides the core functionality for:
//! - Fetching Argo observations with fallback strategies
//! - Cleaning and caching per-region datasets
//! - Training, persisting and serving temperature/salinity models
//! - Region pipeline orchestration
//! - Health checks and observability

pub mod cache;
pub mod clock;
pub mod error;
pub mod fetcher;
pub mod health;
pub mod models;
pub mod observability;
mod persist;
pub mod pipeline;
pub mod predictor;
pub mod settings;
pub mod summary;

pub use cache::{CacheInfo, CacheSnapshot, DataCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{PipelineError, PredictError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{PipelineMetrics, StructuredLogger};
pub use pipeline::{DataSource, ModelSource, PipelineRegistry, PipelineReport, RegionPipeline};
pub use predictor::{ModelFamily, OceanPredictor, Prediction, Predictor};
pub use settings::Settings;
pub use summary::DatasetSummary;
