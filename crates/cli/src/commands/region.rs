//! Region listing and analysis commands

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;

use super::CommandContext;
use ocean_lib::DataSource;
use crate::output::{
    color_flag, color_source, format_measure, print_json, print_table, print_warning, OutputFormat,
};

/// Row for the regions table
#[derive(Tabled, Serialize)]
struct RegionRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Lon")]
    lon: String,
    #[tabled(rename = "Lat")]
    lat: String,
    #[tabled(rename = "Fishing Zones")]
    fishing_zones: usize,
}

/// Row for model metrics
#[derive(Tabled, Serialize)]
pub(crate) struct MetricsRow {
    #[tabled(rename = "Parameter")]
    pub parameter: String,
    #[tabled(rename = "Model")]
    pub model_type: String,
    #[tabled(rename = "MAE")]
    pub mae: f64,
    #[tabled(rename = "R²")]
    pub r2: f64,
}

/// List configured regions
pub fn list_regions(ctx: &CommandContext) -> Result<()> {
    let rows: Vec<RegionRow> = ctx
        .registry
        .settings()
        .regions
        .values()
        .map(|r| RegionRow {
            key: r.key.clone(),
            name: r.name.clone(),
            lon: format!("{} to {}", r.bounds.lon_min, r.bounds.lon_max),
            lat: format!("{} to {}", r.bounds.lat_min, r.bounds.lat_max),
            fishing_zones: r.fishing_zones.len(),
        })
        .collect();

    print_table(&rows, ctx.format);
    Ok(())
}

/// Run the region pipeline and report where data and models came from
pub async fn analyze(ctx: &CommandContext, refresh: bool) -> Result<()> {
    let pipeline = ctx.pipeline()?;
    let mut pipeline = pipeline.lock().await;
    if refresh {
        pipeline.clear_cache();
    }

    let report = pipeline.run().await?;

    match ctx.format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Table => {
            println!("{}", format!("Analysis: {}", pipeline.region().name).bold());
            println!("{}", "=".repeat(60));
            println!("Data source:   {}", color_source(report.source.as_str()));
            println!("Records:       {}", report.records);
            println!("Models ready:  {}", color_flag(report.models_ready));

            match &report.summary {
                Some(summary) => {
                    println!("Profiles:      {}", summary.num_profiles);
                    println!("Floats:        {}", summary.num_floats);
                    println!("Date range:    {}", summary.date_range.cyan());
                    println!(
                        "Surface temp:  {}",
                        format_measure(summary.avg_surface_temp_c, "°C")
                    );
                    println!(
                        "Surface sal:   {}",
                        format_measure(summary.avg_surface_salinity_psu, "PSU")
                    );
                    println!("Deepest point: {} m", summary.deepest_point_m);
                }
                None => print_warning("No summary available"),
            }
            println!();

            let rows: Vec<MetricsRow> = report
                .metrics
                .iter()
                .map(|(parameter, m)| MetricsRow {
                    parameter: parameter.to_string(),
                    model_type: m.model_type.clone(),
                    mae: m.mae,
                    r2: m.r2,
                })
                .collect();
            print_table(&rows, OutputFormat::Table);

            if matches!(report.source, DataSource::Synthetic | DataSource::PartlySynthetic) {
                print_warning("Upstream data was unavailable; results include synthetic profiles");
            }
        }
    }

    Ok(())
}
