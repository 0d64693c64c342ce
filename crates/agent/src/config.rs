//! Agent configuration

use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::warn;

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Name reported in structured logs
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Region keys to run through the pipeline at startup
    #[serde(default)]
    pub warm_regions: Vec<String>,

    /// Pipeline settings file; falls back to `OCEAN_CONFIG` / `ocean.toml`
    #[serde(default)]
    pub settings_path: Option<PathBuf>,
}

fn default_node_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8080
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            node_name: default_node_name(),
            api_port: default_api_port(),
            warm_regions: Vec::new(),
            settings_path: None,
        }
    }
}

impl AgentConfig {
    /// Load configuration from `AGENT_*` environment variables.
    /// `AGENT_WARM_REGIONS` is a comma-separated list.
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("AGENT")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("warm_regions"),
            )
            .build()?;

        Ok(config.try_deserialize().unwrap_or_else(|e| {
            warn!(error = %e, "Invalid agent configuration, using defaults");
            AgentConfig::default()
        }))
    }
}
