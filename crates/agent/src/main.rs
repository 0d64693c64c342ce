//! Ocean Agent - long-running ocean observation pipeline host
//!
//! Warms the pipeline for the configured regions and serves health,
//! readiness and Prometheus metrics for them.

use anyhow::{Context, Result};
use ocean_lib::{
    health::HealthRegistry,
    observability::{PipelineMetrics, StructuredLogger},
    PipelineRegistry, Settings,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;
mod warmup;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = config::AgentConfig::load()?;
    let settings = match &config.settings_path {
        Some(path) => Settings::load_from(Some(path.as_path())),
        None => Settings::load(),
    }
    .context("Failed to load pipeline settings")?;

    let logger = StructuredLogger::new(&config.node_name);
    logger.log_startup(AGENT_VERSION, &config.warm_regions);

    let health_registry = HealthRegistry::new();
    health_registry.register_pipeline().await;

    let metrics = PipelineMetrics::new();
    let pipelines = Arc::new(PipelineRegistry::from_settings(settings)?.with_logger(logger.clone()));

    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics,
        pipelines.clone(),
    ));

    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    let warm_regions = config.warm_regions.clone();
    let warm_health = health_registry.clone();
    let warm_handle = tokio::spawn(async move {
        let ready = warmup::warm_regions(&pipelines, &warm_health, &warm_regions).await;
        info!(ready = ready, requested = warm_regions.len(), "Warm-up finished");
        warm_health.set_ready(true).await;
    });

    tokio::select! {
        result = api_handle => {
            match result {
                Ok(Err(e)) => error!(error = %e, "API server stopped"),
                Err(e) => error!(error = %e, "API server task panicked"),
                Ok(Ok(())) => {}
            }
            logger.log_shutdown("API server exited");
        }
        _ = tokio::signal::ctrl_c() => {
            logger.log_shutdown("SIGINT received");
        }
    }

    warm_handle.abort();
    info!("Shutting down");
    Ok(())
}
