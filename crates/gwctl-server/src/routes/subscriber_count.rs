//! `GET`/`PUT /api/nodes/{nodeId}/subscriber-count`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Json, Router};
use gwctl_core::auth::Claims;
use gwctl_store::StoreAdapter;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

pub fn router<S: StoreAdapter>() -> Router<Arc<AppState<S>>> {
    Router::new().route(
        "/nodes/{node_id}/subscriber-count",
        get(get_count::<S>).put(put_count::<S>),
    )
}

#[derive(Serialize)]
struct SubscriberCountResponse {
    node_id: String,
    subscriber_count: i64,
}

#[derive(Deserialize)]
struct PutCountRequest {
    subscriber_count: i64,
}

async fn get_count<S: StoreAdapter>(
    State(state): State<Arc<AppState<S>>>,
    Path(node_id): Path<String>,
) -> Result<Json<SubscriberCountResponse>, AppError> {
    let record = state.subscriber_counts.get(&node_id).await?;
    Ok(Json(SubscriberCountResponse { node_id, subscriber_count: record.count }))
}

async fn put_count<S: StoreAdapter>(
    State(state): State<Arc<AppState<S>>>,
    Path(node_id): Path<String>,
    Extension(claims): Extension<Claims>,
    Json(body): Json<PutCountRequest>,
) -> Result<StatusCode, AppError> {
    state.subscriber_counts.put(&node_id, body.subscriber_count, &claims.sub).await?;
    Ok(StatusCode::OK)
}
