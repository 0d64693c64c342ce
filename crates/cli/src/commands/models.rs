//! Model inspection commands

use anyhow::Result;
use colored::Colorize;
use ocean_lib::predictor::LoadOutcome;
use ocean_lib::TargetParameter;
use serde::Serialize;
use tabled::Tabled;

use super::region::MetricsRow;
use super::CommandContext;
use crate::output::{print_table, print_warning};

/// Row for feature importance
#[derive(Tabled, Serialize)]
struct ImportanceRow {
    #[tabled(rename = "Feature")]
    feature: String,
    #[tabled(rename = "Importance")]
    importance: String,
}

/// Show held-out metrics of the stored models
pub async fn show_metrics(ctx: &CommandContext) -> Result<()> {
    let pipeline = ctx.pipeline()?;
    let mut pipeline = pipeline.lock().await;

    match pipeline.load_models() {
        LoadOutcome::NotFound => {
            print_warning("No trained models found; run `ocean analyze` first");
            return Ok(());
        }
        LoadOutcome::NoUsableModels => {
            print_warning("Stored models are incomplete or corrupt; run `ocean analyze` to retrain");
            return Ok(());
        }
        LoadOutcome::Loaded { .. } => {}
    }

    let rows: Vec<MetricsRow> = pipeline
        .model_metrics()
        .into_iter()
        .map(|(parameter, m)| MetricsRow {
            parameter: parameter.to_string(),
            model_type: m.model_type,
            mae: m.mae,
            r2: m.r2,
        })
        .collect();

    print_table(&rows, ctx.format);
    Ok(())
}

/// Show feature importance for one parameter, trained on demand
pub async fn show_importance(ctx: &CommandContext, parameter: TargetParameter) -> Result<()> {
    let pipeline = ctx.ready_pipeline().await?;
    let pipeline = pipeline.lock().await;

    let Some(scores) = pipeline.feature_importance(parameter) else {
        print_warning(&format!(
            "No importance scores for {} with the current model family",
            parameter
        ));
        return Ok(());
    };

    let max = scores
        .iter()
        .map(|s| s.importance)
        .fold(0.0_f64, f64::max);
    let rows: Vec<ImportanceRow> = scores
        .iter()
        .map(|s| {
            let bar_len = if max > 0.0 {
                ((s.importance / max) * 20.0).round().max(0.0) as usize
            } else {
                0
            };
            ImportanceRow {
                feature: s.feature.clone(),
                importance: format!("{:.4} {}", s.importance, "█".repeat(bar_len).cyan()),
            }
        })
        .collect();

    print_table(&rows, ctx.format);
    Ok(())
}
