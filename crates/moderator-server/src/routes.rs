//! HTTP routes and handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderValue,
    routing::{get, post},
    Json, Router,
};
use moderator_core::{ModerationRequest, ModerationResult};
use serde_json::{json, Value};
use std::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use crate::config::CorsConfig;
use crate::error::AppError;
use crate::state::AppState;

pub fn create_router(state: AppState) -> anyhow::Result<Router> {
    let cors = build_cors(&state.config.cors)?;

    let mut router = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/moderate", post(moderate))
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = cors {
        router = router.layer(cors);
    }

    Ok(router.with_state(state))
}

/// Build the CORS layer; `None` when CORS is disabled
pub fn build_cors(config: &CorsConfig) -> anyhow::Result<Option<CorsLayer>> {
    if !config.enabled {
        return Ok(None);
    }

    let origin = if config.allowed_origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let origins = config
            .allowed_origins
            .iter()
            .map(|o| {
                HeaderValue::from_str(o)
                    .map_err(|e| anyhow::anyhow!("Invalid CORS origin '{}': {}", o, e))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        AllowOrigin::list(origins)
    };

    Ok(Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any),
    ))
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Moderation API is running 🚀" }))
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "model": state.classifier.name(),
        "labels": state.classifier.labels(),
        "threshold": state.threshold().value(),
    }))
}

async fn metrics(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}

async fn moderate(
    State(state): State<AppState>,
    payload: Result<Json<ModerationRequest>, JsonRejection>,
) -> Result<Json<ModerationResult>, AppError> {
    metrics::counter!("moderator_requests_total").increment(1);

    let result = run_moderation(&state, payload).await;
    if let Err(e) = &result {
        metrics::counter!("moderator_errors_total", "type" => e.metric_label()).increment(1);
    }
    result.map(Json)
}

async fn run_moderation(
    state: &AppState,
    payload: Result<Json<ModerationRequest>, JsonRejection>,
) -> Result<ModerationResult, AppError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!("Rejected moderation request: {}", rejection.body_text());
        AppError::from(rejection)
    })?;

    let start = Instant::now();
    let labels = state.classifier.classify(&request.text).await.map_err(|e| {
        error!("Inference failed: {}", e);
        e
    })?;
    metrics::histogram!("moderator_inference_latency_us")
        .record(start.elapsed().as_micros() as f64);

    let result = ModerationResult::decide(request.text, labels, state.threshold()).map_err(|e| {
        error!("Moderation decision failed: {}", e);
        e
    })?;

    if result.toxic() {
        metrics::counter!("moderator_toxic_total").increment(1);
    }
    debug!(
        toxic = result.toxic(),
        top = ?result.labels().top(),
        "Moderation complete"
    );

    Ok(result)
}
