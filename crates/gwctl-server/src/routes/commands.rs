//! `POST /api/pppoe/{dial|hangup}` — publish an imperative command.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use gwctl_core::commands::Action;
use gwctl_store::StoreAdapter;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

pub fn router<S: StoreAdapter>() -> Router<Arc<AppState<S>>> {
    Router::new().route("/pppoe/dial", post(dial::<S>)).route("/pppoe/hangup", post(hangup::<S>))
}

#[derive(Deserialize)]
struct PublishRequest {
    node_id: String,
    user_id: String,
}

async fn dial<S: StoreAdapter>(
    State(state): State<Arc<AppState<S>>>,
    Json(body): Json<PublishRequest>,
) -> Result<StatusCode, AppError> {
    state.commands.publish(&body.node_id, &body.user_id, Action::Dial).await?;
    Ok(StatusCode::OK)
}

async fn hangup<S: StoreAdapter>(
    State(state): State<Arc<AppState<S>>>,
    Json(body): Json<PublishRequest>,
) -> Result<StatusCode, AppError> {
    state.commands.publish(&body.node_id, &body.user_id, Action::Hangup).await?;
    Ok(StatusCode::OK)
}
