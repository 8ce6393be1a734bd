use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;
use crate::store::{migrate, Store, StoreError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health_check))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
        .route("/database", get(database_health))
        .route("/metrics", get(metrics))
}

/// 读一次版本标记，返回耗时
fn probe_store(store: &Store) -> Result<Duration, StoreError> {
    let start = Instant::now();
    migrate::current_version(store)?;
    Ok(start.elapsed())
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptimeSecs": state.uptime_secs(),
    }))
}

async fn liveness() -> StatusCode {
    StatusCode::OK
}

async fn readiness(State(state): State<AppState>) -> StatusCode {
    match probe_store(state.store()) {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness probe failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn database_health(State(state): State<AppState>) -> impl IntoResponse {
    let (status, body) = match probe_store(state.store()) {
        Ok(latency) => (
            StatusCode::OK,
            json!({ "healthy": true, "latencyUs": latency.as_micros() as u64 }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            json!({ "healthy": false, "error": e.to_string() }),
        ),
    };
    (status, Json(body))
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "activeDetectionSessions": state.registry().active_count().await,
        "uptimeSecs": state.uptime_secs(),
    }))
}
