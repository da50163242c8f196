//! `GET /api/failed-events[/{nodeId}]` — read the failed-event history.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use gwctl_core::failed_events::FailedEvent;
use gwctl_store::StoreAdapter;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

pub fn router<S: StoreAdapter>() -> Router<Arc<AppState<S>>> {
    Router::new()
        .route("/failed-events", get(list_all::<S>))
        .route("/failed-events/{node_id}", get(list_for_node::<S>))
}

#[derive(Deserialize)]
struct EventTypeFilter {
    event_type: Option<String>,
}

async fn list_all<S: StoreAdapter>(
    State(state): State<Arc<AppState<S>>>,
    Query(filter): Query<EventTypeFilter>,
) -> Result<Json<Vec<FailedEvent>>, AppError> {
    let history = state.failed_events.read_history(None, filter.event_type.as_deref()).await?;
    Ok(Json(history))
}

async fn list_for_node<S: StoreAdapter>(
    State(state): State<Arc<AppState<S>>>,
    Path(node_id): Path<String>,
    Query(filter): Query<EventTypeFilter>,
) -> Result<Json<Vec<FailedEvent>>, AppError> {
    let history = state.failed_events.read_history(Some(&node_id), filter.event_type.as_deref()).await?;
    Ok(Json(history))
}
