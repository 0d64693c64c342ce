//! Time-boxed on-disk cache of cleaned datasets
//!
//! Layout under `<cache_dir>/<region_key>/`:
//! - `processed_data.json` - the cleaned records
//! - `summary.json` - the dataset summary
//! - `cache_metadata.json` - cached-at time, record count and date range
//!
//! Validity is a pure function of file presence and the clock; nothing is
//! marked dirty. Any unreadable state counts as a miss. The metadata is
//! removed before a save and written last, so an interrupted save leaves
//! no valid entry behind.

use crate::clock::Clock;
use crate::models::CleanedDataset;
use crate::persist::{remove_if_present, write_atomic};
use crate::summary::DatasetSummary;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const DATA_FILE: &str = "processed_data.json";
const SUMMARY_FILE: &str = "summary.json";
const METADATA_FILE: &str = "cache_metadata.json";

/// Default expiry window in days
pub const DEFAULT_EXPIRY_DAYS: i64 = 7;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Metadata sidecar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub cached_at: DateTime<Utc>,
    pub region_key: String,
    pub data_points: usize,
    #[serde(default)]
    pub date_range: DateRange,
}

/// Cached dataset and, if it was readable, its summary
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSnapshot {
    pub dataset: CleanedDataset,
    pub summary: Option<DatasetSummary>,
}

/// Introspection result; never mutates the cache
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheInfo {
    pub cached: bool,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<DateTime<Utc>>,
    pub data_points: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
}

impl CacheInfo {
    fn missing() -> Self {
        Self {
            cached: false,
            valid: false,
            cached_at: None,
            data_points: 0,
            date_range: None,
        }
    }
}

/// Region-scoped dataset cache
#[derive(Clone)]
pub struct DataCache {
    root: PathBuf,
    expiry: Duration,
    clock: Arc<dyn Clock>,
}

impl DataCache {
    pub fn new(root: impl Into<PathBuf>, expiry_days: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            root: root.into(),
            expiry: Duration::days(expiry_days),
            clock,
        }
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub fn region_dir(&self, region_key: &str) -> PathBuf {
        self.root.join(region_key)
    }

    fn data_path(&self, region_key: &str) -> PathBuf {
        self.region_dir(region_key).join(DATA_FILE)
    }

    fn summary_path(&self, region_key: &str) -> PathBuf {
        self.region_dir(region_key).join(SUMMARY_FILE)
    }

    fn metadata_path(&self, region_key: &str) -> PathBuf {
        self.region_dir(region_key).join(METADATA_FILE)
    }

    fn read_metadata(&self, region_key: &str) -> Option<CacheMetadata> {
        let path = self.metadata_path(region_key);
        let data = fs::read(&path).ok()?;
        match serde_json::from_slice(&data) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Unreadable cache metadata");
                None
            }
        }
    }

    fn is_fresh(&self, metadata: &CacheMetadata) -> bool {
        self.clock.now() < metadata.cached_at + self.expiry
    }

    /// True only if the data and metadata files exist, the metadata parses,
    /// and the entry is younger than the expiry window
    pub fn is_valid(&self, region_key: &str) -> bool {
        if !(self.data_path(region_key).exists() && self.metadata_path(region_key).exists()) {
            return false;
        }
        self.read_metadata(region_key)
            .map(|m| self.is_fresh(&m))
            .unwrap_or(false)
    }

    /// Write the dataset, summary and metadata. Failures are logged and
    /// reported as `false`; a later save can simply retry.
    pub fn save(&self, region_key: &str, dataset: &CleanedDataset, summary: &DatasetSummary) -> bool {
        match self.try_save(region_key, dataset, summary) {
            Ok(()) => {
                info!(region = %region_key, records = dataset.len(), "Data cached");
                true
            }
            Err(e) => {
                warn!(region = %region_key, error = %e, "Failed to cache data");
                false
            }
        }
    }

    fn try_save(&self, region_key: &str, dataset: &CleanedDataset, summary: &DatasetSummary) -> Result<()> {
        let dir = self.region_dir(region_key);
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create cache directory {:?}", dir))?;
        remove_if_present(&self.metadata_path(region_key));

        let data = serde_json::to_vec(dataset).context("Failed to serialize dataset")?;
        write_atomic(&self.data_path(region_key), &data)?;

        let summary_json = serde_json::to_vec_pretty(summary).context("Failed to serialize summary")?;
        write_atomic(&self.summary_path(region_key), &summary_json)?;

        let (start, end) = dataset
            .date_range()
            .map(|(s, e)| (Some(s), Some(e)))
            .unwrap_or((None, None));
        let metadata = CacheMetadata {
            cached_at: self.clock.now(),
            region_key: region_key.to_string(),
            data_points: dataset.len(),
            date_range: DateRange { start, end },
        };
        let metadata_json =
            serde_json::to_vec_pretty(&metadata).context("Failed to serialize cache metadata")?;
        write_atomic(&self.metadata_path(region_key), &metadata_json)
    }

    /// Load a valid entry. Expired, missing or unreadable entries are `None`.
    pub fn load(&self, region_key: &str) -> Option<CacheSnapshot> {
        if !self.is_valid(region_key) {
            return None;
        }

        let dataset = match read_json::<CleanedDataset>(&self.data_path(region_key)) {
            Ok(dataset) => dataset,
            Err(e) => {
                warn!(region = %region_key, error = %e, "Failed to load cached data");
                return None;
            }
        };

        let summary_path = self.summary_path(region_key);
        let summary = if summary_path.exists() {
            read_json::<DatasetSummary>(&summary_path)
                .map_err(|e| warn!(region = %region_key, error = %e, "Ignoring unreadable cached summary"))
                .ok()
        } else {
            None
        };

        info!(region = %region_key, records = dataset.len(), "Loaded cached data");
        Some(CacheSnapshot { dataset, summary })
    }

    /// Remove every artifact for the region; idempotent
    pub fn clear(&self, region_key: &str) {
        remove_if_present(&self.data_path(region_key));
        remove_if_present(&self.summary_path(region_key));
        remove_if_present(&self.metadata_path(region_key));
        info!(region = %region_key, "Cache cleared");
    }

    pub fn info(&self, region_key: &str) -> CacheInfo {
        let Some(metadata) = self.read_metadata(region_key) else {
            return CacheInfo::missing();
        };

        CacheInfo {
            cached: true,
            valid: self.data_path(region_key).exists() && self.is_fresh(&metadata),
            cached_at: Some(metadata.cached_at),
            data_points: metadata.data_points,
            date_range: Some(metadata.date_range),
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let data = fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_slice(&data).with_context(|| format!("Failed to parse {:?}", path))
}
