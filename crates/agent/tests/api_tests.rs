//! Integration tests for the agent API endpoints

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use ocean_lib::{
    health::{components, ComponentStatus, HealthRegistry},
    observability::PipelineMetrics,
    pipeline::{DataSource, ModelSource, PipelineReport},
    PipelineError,
};
use prometheus::{Encoder, TextEncoder};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower::ServiceExt;

#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: PipelineMetrics,
}

async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;
    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;
    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(readiness))
}

async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

fn create_test_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    health_registry.register_pipeline().await;

    let state = Arc::new(AppState {
        health_registry,
        metrics: PipelineMetrics::new(),
    });
    let router = create_test_router(state.clone());

    (router, state)
}

fn report(source: DataSource, models_ready: bool) -> PipelineReport {
    PipelineReport {
        region_key: "arabian_sea".to_string(),
        source,
        records: 420,
        summary: None,
        metrics: BTreeMap::new(),
        models: if models_ready {
            ModelSource::Trained
        } else {
            ModelSource::Unavailable
        },
        models_ready,
    }
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app().await;

    let (status, health) = get_json(app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
}

#[tokio::test]
async fn test_healthz_ok_when_only_synthetic_data() {
    let (app, state) = setup_test_app().await;
    state
        .health_registry
        .record_run("arabian_sea", &Ok(report(DataSource::Synthetic, true)))
        .await;

    let (status, health) = get_json(app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["components"]["fetcher"]["status"], "degraded");
    assert_eq!(health["components"]["predictor"]["status"], "healthy");
}

#[tokio::test]
async fn test_healthz_returns_503_when_run_failed() {
    let (app, state) = setup_test_app().await;
    state
        .health_registry
        .record_run(
            "bay_of_bengal",
            &Err(PipelineError::NoUsableData("bay_of_bengal".to_string())),
        )
        .await;

    let (status, health) = get_json(app, "/healthz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_returns_503_before_warm_up() {
    let (app, _state) = setup_test_app().await;

    let (status, readiness) = get_json(app, "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(readiness["ready"], false);
}

#[tokio::test]
async fn test_readyz_returns_ok_after_warm_up_without_model() {
    let (app, state) = setup_test_app().await;
    state
        .health_registry
        .record_run("arabian_sea", &Ok(report(DataSource::Upstream, false)))
        .await;
    state.health_registry.set_ready(true).await;

    let (status, readiness) = get_json(app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, state) = setup_test_app().await;
    state.metrics.inc_cache_hit();
    state.metrics.observe_fetch_latency(0.25);

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("ocean_cache_hits_total"));
    assert!(metrics_text.contains("ocean_fetch_latency_seconds_bucket"));
    assert!(metrics_text.contains("ocean_fetch_latency_seconds_count"));
}

#[tokio::test]
async fn test_healthz_includes_component_details() {
    let (app, _state) = setup_test_app().await;

    let (_, health) = get_json(app, "/healthz").await;
    for name in components::ALL {
        assert!(health["components"][name].is_object(), "missing {}", name);
    }
}
