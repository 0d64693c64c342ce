//! Startup warm-up of configured regions

use ocean_lib::{HealthRegistry, PipelineRegistry};
use tracing::{info, warn};

/// Run each region's pipeline once and fold the outcomes into health.
/// Returns the number of regions that ended with a ready model.
pub async fn warm_regions(
    pipelines: &PipelineRegistry,
    health: &HealthRegistry,
    regions: &[String],
) -> usize {
    let mut ready = 0;

    for key in regions {
        let pipeline = match pipelines.get_or_create(key) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                warn!(region = %key, error = %e, "Skipping warm region");
                continue;
            }
        };

        let outcome = pipeline.lock().await.run().await;
        health.record_run(key, &outcome).await;

        match &outcome {
            Ok(report) if report.models_ready => {
                ready += 1;
                info!(
                    region = %key,
                    source = report.source.as_str(),
                    records = report.records,
                    "Region warmed"
                );
            }
            Ok(report) => {
                warn!(region = %key, records = report.records, "Region warmed without a ready model");
            }
            Err(e) => warn!(region = %key, error = %e, "Region warm-up failed"),
        }
    }

    ready
}
