//! `GET /api/health` — liveness plus store reachability.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use gwctl_store::StoreAdapter;
use serde::Serialize;

use crate::state::AppState;

const HEALTH_CHECK_DEADLINE: Duration = Duration::from_secs(2);

pub fn router<S: StoreAdapter>() -> Router<Arc<AppState<S>>> {
    Router::new().route("/health", get(health::<S>))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    store: &'static str,
}

async fn health<S: StoreAdapter>(State(state): State<Arc<AppState<S>>>) -> Json<HealthResponse> {
    let store_status = match state.store.get("health-check-sentinel", HEALTH_CHECK_DEADLINE).await {
        Ok(_) => "reachable",
        Err(_) => "unreachable",
    };
    Json(HealthResponse { status: "ok", store: store_status })
}
