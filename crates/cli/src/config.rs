//! Configuration management for the CLI

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Per-user CLI defaults, stored as JSON
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Region used when `--region` is not given
    pub default_region: Option<String>,
    /// Pipeline settings file used when `--config` is not given
    pub settings_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the user's config directory
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from `path`; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;

        serde_json::from_str(&content).context("Failed to parse config file")
    }

    /// Region to use, preferring the command-line flag
    pub fn resolve_region(&self, flag: Option<String>) -> String {
        flag.or_else(|| self.default_region.clone())
            .unwrap_or_else(|| DEFAULT_REGION.to_string())
    }

    fn config_path() -> Option<PathBuf> {
        dirs_next::config_dir().map(|dir| dir.join("ocean").join("config.json"))
    }
}

pub const DEFAULT_REGION: &str = "arabian_sea";
