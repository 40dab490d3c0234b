//! HTTP route handlers — prediction serving, model reload, audit reads.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::db::pool;
use crate::db::queries;
use crate::db::store::start_of_day;
use crate::error::ModelError;
use crate::events::bus::BotEvent;
use crate::features::vector::FeatureVector;

use super::server::AppState;

const RELOAD_SECRET_HEADER: &str = "x-reload-secret";

/// Build all API routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/status", get(status))
        .route("/api/predict", post(predict))
        .route("/api/model/reload", post(reload_model))
        .route("/api/attempts", get(attempts))
        .route("/api/profiles/:id", get(profile_detail))
        .route("/api/jobs/:id", get(job_detail))
        .route("/health", get(health))
}

/// GET /api/status — overall bot status.
async fn status(State(state): State<AppState>) -> Json<Value> {
    let attempts_today = queries::count_attempts_since(
        &state.db,
        start_of_day(chrono::Utc::now()),
    )
    .await
    .unwrap_or(0);

    Json(json!({
        "status": "running",
        "model_loaded": state.prediction.is_loaded(),
        "model_info": state.prediction.model_info(),
        "attempts_today": attempts_today,
    }))
}

#[derive(Debug, Deserialize)]
struct PredictRequest {
    features: serde_json::Map<String, Value>,
}

/// POST /api/predict — score a named feature map.
///
/// 503 when no model is loaded, 500 for inference errors: callers must be
/// able to tell "come back after reload" from "this input broke inference".
async fn predict(
    State(state): State<AppState>,
    Json(req): Json<PredictRequest>,
) -> (StatusCode, Json<Value>) {
    let mut fv = FeatureVector::with_capacity(req.features.len());
    for (name, value) in &req.features {
        match value.as_f64() {
            Some(v) => fv.insert(name.clone(), v),
            None => {
                warn!(feature = %name, "non-numeric feature value, imputing 0.0");
                fv.insert(name.clone(), 0.0);
            }
        }
    }

    match state.prediction.predict(&fv) {
        Ok(p) => (
            StatusCode::OK,
            Json(json!({
                "success_probability": p.success_probability,
                "model_info": p.model_info,
            })),
        ),
        Err(ModelError::NotLoaded) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "no model loaded" })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        ),
    }
}

/// POST /api/model/reload — hot-swap the model artifact.
/// Guarded by a shared secret so a retrain pipeline can trigger it.
async fn reload_model(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if state.reload_secret.is_empty() {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "model reload is not configured" })),
        );
    }

    let presented = headers
        .get(RELOAD_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if presented != state.reload_secret {
        warn!("model reload rejected: bad or missing secret");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid reload secret" })),
        );
    }

    match state.prediction.reload() {
        Ok(()) => {
            let model_info = state.prediction.model_info().unwrap_or_default();
            info!(model_info = %model_info, "model reloaded via API");
            state.event_bus.publish(BotEvent::ModelReloaded {
                model_info: model_info.clone(),
            });
            (
                StatusCode::OK,
                Json(json!({ "reloaded": true, "model_info": model_info })),
            )
        }
        Err(e) => (
            // The previous model (if any) is still serving
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "reloaded": false, "error": e.to_string() })),
        ),
    }
}

/// GET /api/attempts — recent bid attempts from the audit log.
async fn attempts(State(state): State<AppState>) -> Json<Value> {
    match queries::get_recent_attempts(&state.db, 50).await {
        Ok(rows) => Json(json!({ "attempts": rows })),
        Err(e) => Json(json!({ "error": e.to_string() })),
    }
}

/// GET /api/profiles/:id — one profile plus its current stats row.
async fn profile_detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> (StatusCode, Json<Value>) {
    match queries::get_profile(&state.db, id).await {
        Ok(Some(profile)) => {
            let stats = queries::get_stats(&state.db, id).await.unwrap_or(None);
            (
                StatusCode::OK,
                Json(json!({ "profile": profile, "stats": stats })),
            )
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "profile not found" })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        ),
    }
}

/// GET /api/jobs/:id — one discovered job.
async fn job_detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> (StatusCode, Json<Value>) {
    match queries::get_job(&state.db, id).await {
        Ok(Some(job)) => (StatusCode::OK, Json(json!({ "job": job }))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "job not found" })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        ),
    }
}

/// GET /health — liveness plus a database round trip.
async fn health(State(state): State<AppState>) -> (StatusCode, &'static str) {
    match pool::health_check(&state.db).await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "database unavailable"),
    }
}
