//! Ocean observation pipeline CLI
//!
//! Drives the pipeline in-process: fetch or reuse regional observations,
//! train or load models, and query point predictions.

mod commands;
mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::{cache, models, predict, region, CommandContext};
use ocean_lib::{PipelineRegistry, Settings, TargetParameter};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Ocean observation pipeline CLI
#[derive(Parser)]
#[command(name = "ocean")]
#[command(author, version, about = "CLI for the Ocean Observation Pipeline", long_about = None)]
pub struct Cli {
    /// Pipeline settings file (can also be set via OCEAN_CONFIG env var)
    #[arg(long, env = "OCEAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Region key (see `ocean regions`)
    #[arg(long, short, global = true)]
    pub region: Option<String>,

    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List configured regions
    Regions,

    /// Run the pipeline for a region and show its data summary
    Analyze {
        /// Discard cached data before running
        #[arg(long)]
        refresh: bool,
    },

    /// Predict temperature and salinity at a point
    Predict {
        /// Latitude in degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude in degrees
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Depth in metres
        #[arg(long)]
        depth: f64,

        /// Month (1-12)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: u32,
    },

    /// Inspect or clear the data cache
    #[command(subcommand)]
    Cache(CacheCommands),

    /// Inspect trained models
    #[command(subcommand)]
    Models(ModelsCommands),
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Show cache status for the region
    Info,

    /// Remove cached data for the region
    Clear,
}

#[derive(Subcommand)]
pub enum ModelsCommands {
    /// Show held-out metrics of the stored models
    Metrics,

    /// Show feature importance for one parameter
    Importance {
        /// Target parameter (temperature or salinity)
        #[arg(long, default_value = "temperature")]
        parameter: TargetParameter,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let user_config = config::Config::load()?;
    let settings_path = cli.config.clone().or_else(|| user_config.settings_path.clone());
    let settings = match &settings_path {
        Some(path) => Settings::load_from(Some(path.as_path())),
        None => Settings::load(),
    }
    .context("Failed to load pipeline settings")?;

    let ctx = CommandContext {
        registry: PipelineRegistry::from_settings(settings)?,
        region: user_config.resolve_region(cli.region.clone()),
        format: cli.format,
    };

    match cli.command {
        Commands::Regions => region::list_regions(&ctx),
        Commands::Analyze { refresh } => region::analyze(&ctx, refresh).await,
        Commands::Predict {
            lat,
            lon,
            depth,
            month,
        } => predict::predict(&ctx, lat, lon, depth, month).await,
        Commands::Cache(cache_cmd) => match cache_cmd {
            CacheCommands::Info => cache::show_info(&ctx),
            CacheCommands::Clear => cache::clear(&ctx),
        },
        Commands::Models(models_cmd) => match models_cmd {
            ModelsCommands::Metrics => models::show_metrics(&ctx).await,
            ModelsCommands::Importance { parameter } => {
                models::show_importance(&ctx, parameter).await
            }
        },
    }
}
