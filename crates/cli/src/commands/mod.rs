//! CLI subcommands

pub mod cache;
pub mod models;
pub mod predict;
pub mod region;

use crate::output::{print_info, OutputFormat};
use anyhow::{anyhow, Result};
use ocean_lib::{PipelineRegistry, RegionPipeline, RegionSpec};
use std::sync::Arc;
use tokio::sync::Mutex;

/// State shared by every subcommand
pub struct CommandContext {
    pub registry: PipelineRegistry,
    pub region: String,
    pub format: OutputFormat,
}

impl CommandContext {
    /// The selected region, rejected early when it is not configured
    pub fn require_region(&self) -> Result<&RegionSpec> {
        self.registry.settings().region(&self.region).ok_or_else(|| {
            anyhow!(
                "Unknown region '{}' (known regions: {})",
                self.region,
                self.known_regions()
            )
        })
    }

    pub fn pipeline(&self) -> Result<Arc<Mutex<RegionPipeline>>> {
        self.require_region()?;
        Ok(self.registry.get_or_create(&self.region)?)
    }

    fn known_regions(&self) -> String {
        self.registry
            .settings()
            .regions
            .keys()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Ensure models are loaded, running the full pipeline when nothing
    /// usable is stored yet
    pub async fn ready_pipeline(&self) -> Result<Arc<Mutex<RegionPipeline>>> {
        let pipeline = self.pipeline()?;
        {
            let mut guard = pipeline.lock().await;
            guard.load_models();
            if !guard.is_ready() {
                print_info(&format!("No stored models for {}, running pipeline", self.region));
                guard.run().await?;
            }
        }
        Ok(pipeline)
    }
}
