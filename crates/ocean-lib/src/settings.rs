//! Pipeline settings
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! `ocean.{toml,json,yaml}` file (or the path in `OCEAN_CONFIG`), then
//! `OCEAN__SECTION__KEY` environment variables.

use crate::models::{BoundingBox, FishingZone, RegionSpec};
use anyhow::Result;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Default ERDDAP tabledap endpoint serving Argo float profiles
pub const DEFAULT_UPSTREAM_URL: &str = "https://erddap.ifremer.fr/erddap/tabledap";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_regions")]
    pub regions: BTreeMap<String, RegionSpec>,
    #[serde(default)]
    pub data: DataSettings,
    #[serde(default)]
    pub model: ModelSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataSettings {
    /// Years to fetch, each handled independently by the fallback cascade
    #[serde(default = "default_years")]
    pub years: Vec<i32>,
    #[serde(default = "default_months")]
    pub months: Vec<u32>,
    #[serde(default = "default_max_depth")]
    pub max_depth: f64,
    #[serde(default = "default_upstream_url")]
    pub upstream_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelSettings {
    #[serde(default = "default_test_size")]
    pub test_size: f64,
    #[serde(default = "default_random_state")]
    pub random_state: u64,
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,
    /// Preferred model family; unknown or unavailable values fall back
    #[serde(default = "default_preference")]
    pub preference: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,
    #[serde(default = "default_cache_expiry_days")]
    pub cache_expiry_days: i64,
}

fn default_regions() -> BTreeMap<String, RegionSpec> {
    let zone = |lat: [f64; 2], lon: [f64; 2]| FishingZone { lat, lon };
    let region = |key: &str, name: &str, bounds: [f64; 4], zones: Vec<(&str, FishingZone)>| {
        (
            key.to_string(),
            RegionSpec {
                key: key.to_string(),
                name: name.to_string(),
                bounds: BoundingBox::from(bounds),
                fishing_zones: zones
                    .into_iter()
                    .map(|(n, z)| (n.to_string(), z))
                    .collect(),
            },
        )
    };

    [
        region(
            "arabian_sea",
            "Arabian Sea",
            [50.0, 80.0, 5.0, 25.0],
            vec![
                ("Gujarat Coast", zone([20.0, 22.0], [68.0, 71.0])),
                ("Goa-Karnataka Coast", zone([13.0, 16.0], [73.0, 75.0])),
            ],
        ),
        region(
            "bay_of_bengal",
            "Bay of Bengal",
            [80.0, 100.0, 5.0, 22.0],
            vec![
                ("North Andhra Coast", zone([17.0, 19.0], [84.0, 86.0])),
                ("Odisha Coast", zone([19.0, 21.0], [86.0, 88.0])),
            ],
        ),
        region(
            "north_indian_ocean",
            "North Indian Ocean",
            [40.0, 100.0, 0.0, 30.0],
            vec![
                ("Central Indian Ocean", zone([5.0, 15.0], [60.0, 80.0])),
                ("Western Indian Ocean", zone([10.0, 20.0], [50.0, 70.0])),
            ],
        ),
    ]
    .into_iter()
    .collect()
}

fn default_years() -> Vec<i32> {
    vec![2022, 2024]
}

fn default_months() -> Vec<u32> {
    vec![6, 7, 8]
}

fn default_max_depth() -> f64 {
    2000.0
}

fn default_upstream_url() -> String {
    DEFAULT_UPSTREAM_URL.to_string()
}

fn default_request_timeout() -> u64 {
    60
}

fn default_test_size() -> f64 {
    0.2
}

fn default_random_state() -> u64 {
    42
}

fn default_n_estimators() -> usize {
    100
}

fn default_preference() -> String {
    "boosting".to_string()
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("data_cache")
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_cache_expiry_days() -> i64 {
    7
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            years: default_years(),
            months: default_months(),
            max_depth: default_max_depth(),
            upstream_url: default_upstream_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            test_size: default_test_size(),
            random_state: default_random_state(),
            n_estimators: default_n_estimators(),
            preference: default_preference(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            model_dir: default_model_dir(),
            cache_expiry_days: default_cache_expiry_days(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            regions: default_regions(),
            data: DataSettings::default(),
            model: ModelSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from the default file location and environment
    pub fn load() -> Result<Self> {
        let path = std::env::var("OCEAN_CONFIG").ok().map(PathBuf::from);
        Self::load_from(path.as_deref())
    }

    /// Load settings from an explicit file (if given) and environment
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => config::File::from(p.to_path_buf()).required(true),
            None => config::File::with_name("ocean").required(false),
        };

        let config = config::Config::builder()
            .add_source(file)
            .add_source(config::Environment::with_prefix("OCEAN").separator("__"))
            .build()?;

        let settings = config.try_deserialize::<Settings>().unwrap_or_else(|e| {
            warn!(error = %e, "Invalid pipeline settings, using defaults");
            Settings::default()
        });

        Ok(settings.normalized())
    }

    /// Fill derived fields that configuration sources leave implicit
    fn normalized(mut self) -> Self {
        for (key, region) in self.regions.iter_mut() {
            region.key = key.clone();
        }
        self.data.months.retain(|m| (1..=12).contains(m));
        self
    }

    pub fn region(&self, key: &str) -> Option<&RegionSpec> {
        self.regions.get(key)
    }

    /// Settings rooted under a scratch directory, for tests and dry runs
    pub fn with_storage_root(mut self, root: &Path) -> Self {
        self.storage.cache_dir = root.join("data_cache");
        self.storage.model_dir = root.join("models");
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.regions.len(), 3);
        assert_eq!(settings.data.months, vec![6, 7, 8]);
        assert_eq!(settings.model.random_state, 42);
        assert_eq!(settings.storage.cache_expiry_days, 7);

        let arabian = settings.region("arabian_sea").unwrap();
        assert_eq!(arabian.bounds, BoundingBox::new(50.0, 80.0, 5.0, 25.0));
        assert_eq!(arabian.fishing_zones.len(), 2);
    }

    #[test]
    fn test_load_from_file_overrides_sections() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ocean.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[model]
preference = "linear"
n_estimators = 25

[regions.test_box]
name = "Test Box"
bounds = [60.0, 70.0, 10.0, 20.0]
"#
        )
        .unwrap();

        let settings = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(settings.model.preference, "linear");
        assert_eq!(settings.model.n_estimators, 25);
        assert_eq!(settings.model.random_state, 42);

        let region = settings.region("test_box").unwrap();
        assert_eq!(region.key, "test_box");
        assert_eq!(region.name, "Test Box");
        assert!(region.bounds.contains(15.0, 65.0));
    }

    #[test]
    fn test_storage_root_override() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::default().with_storage_root(temp_dir.path());
        assert!(settings.storage.cache_dir.starts_with(temp_dir.path()));
        assert!(settings.storage.model_dir.starts_with(temp_dir.path()));
    }
}
