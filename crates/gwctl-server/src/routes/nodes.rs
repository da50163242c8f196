//! Node administration: `GET /api/nodes`, `DELETE /api/nodes/{uuid}`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use gwctl_store::StoreAdapter;
use serde::Serialize;

use crate::error::AppError;
use crate::state::AppState;

pub fn router<S: StoreAdapter>() -> Router<Arc<AppState<S>>> {
    Router::new().route("/nodes", get(list_nodes::<S>)).route("/nodes/{uuid}", axum::routing::delete(delete_node::<S>))
}

#[derive(Serialize)]
struct NodeEntry {
    key: String,
    value: serde_json::Value,
}

/// Raw key+value pairs under `nodes/`, as spec §6 specifies — not a typed
/// projection, so any future field the node record gains is visible
/// without a server change.
async fn list_nodes<S: StoreAdapter>(State(state): State<Arc<AppState<S>>>) -> Result<Json<Vec<NodeEntry>>, AppError> {
    let kvs = state.registry.list().await?;
    let entries = kvs
        .into_iter()
        .map(|kv| NodeEntry { key: kv.key, value: serde_json::from_slice(&kv.value).unwrap_or(serde_json::Value::Null) })
        .collect();
    Ok(Json(entries))
}

async fn delete_node<S: StoreAdapter>(
    State(state): State<Arc<AppState<S>>>,
    Path(uuid): Path<String>,
) -> Result<StatusCode, AppError> {
    state.registry.unregister(&uuid).await?;
    Ok(StatusCode::OK)
}
