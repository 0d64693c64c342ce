//! Point prediction command

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;

use super::CommandContext;
use crate::output::{color_confidence, print_json, print_table, print_warning, OutputFormat};

/// Row for the prediction table
#[derive(Tabled, Serialize)]
struct EstimateRow {
    #[tabled(rename = "Parameter")]
    parameter: String,
    #[tabled(rename = "Value")]
    value: f64,
    #[tabled(rename = "Confidence")]
    confidence: String,
}

pub async fn predict(
    ctx: &CommandContext,
    latitude: f64,
    longitude: f64,
    depth: f64,
    month: u32,
) -> Result<()> {
    let pipeline = ctx.ready_pipeline().await?;
    let pipeline = pipeline.lock().await;

    if !pipeline.region().bounds.contains(latitude, longitude) {
        print_warning(&format!(
            "({}, {}) lies outside {}; the estimate is an extrapolation",
            latitude,
            longitude,
            pipeline.region().name
        ));
    }

    let prediction = pipeline.predict(latitude, longitude, depth, month)?;

    match ctx.format {
        OutputFormat::Json => print_json(&prediction),
        OutputFormat::Table => {
            println!(
                "{}",
                format!(
                    "Prediction at {:.2}°, {:.2}° / {} m / month {}",
                    latitude, longitude, depth, month
                )
                .bold()
            );

            let rows: Vec<EstimateRow> = prediction
                .parameters()
                .filter_map(|p| {
                    prediction.get(p).map(|e| EstimateRow {
                        parameter: p.to_string(),
                        value: e.value,
                        confidence: color_confidence(e.confidence),
                    })
                })
                .collect();
            print_table(&rows, OutputFormat::Table);

            if let Some(reason) = prediction.low_confidence_reason() {
                print_warning(&reason);
            }
        }
    }

    Ok(())
}
