//! HTTP API for health checks and Prometheus metrics

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use ocean_lib::{
    health::{ComponentStatus, HealthRegistry},
    observability::PipelineMetrics,
    PipelineRegistry,
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: PipelineMetrics,
    pub pipelines: Arc<PipelineRegistry>,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        metrics: PipelineMetrics,
        pipelines: Arc<PipelineRegistry>,
    ) -> Self {
        Self {
            health_registry,
            metrics,
            pipelines,
        }
    }
}

/// Health check response - 200 while operational, 503 once a component fails
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - 200 after warm-up, 503 before
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

#[derive(Debug, Serialize)]
struct RegionStatus {
    key: String,
    ready: bool,
    records: usize,
    source: Option<&'static str>,
}

/// Regions with a live pipeline and whether their models are ready
async fn regions(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut statuses = Vec::new();
    for key in state.pipelines.active_regions() {
        let Some(pipeline) = state.pipelines.get(&key) else {
            continue;
        };
        // A region mid-run reports as busy rather than blocking the probe
        let Ok(pipeline) = pipeline.try_lock() else {
            statuses.push(RegionStatus {
                key,
                ready: false,
                records: 0,
                source: None,
            });
            continue;
        };
        statuses.push(RegionStatus {
            key,
            ready: pipeline.is_ready(),
            records: pipeline.dataset().len(),
            source: pipeline.data_source().map(|s| s.as_str()),
        });
    }

    Json(statuses)
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/regions", get(regions))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
