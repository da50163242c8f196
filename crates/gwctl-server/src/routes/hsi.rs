//! HSI config CRUD: `/api/config/{nodeId}/hsi[/{userId}]` and the
//! `hsi/users` listing.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Json, Router};
use gwctl_core::auth::Claims;
use gwctl_core::hsi::{HsiConfig, HsiRecord};
use gwctl_store::StoreAdapter;
use serde::Serialize;

use crate::error::AppError;
use crate::state::AppState;

pub fn router<S: StoreAdapter>() -> Router<Arc<AppState<S>>> {
    Router::new()
        .route("/config/{node_id}/hsi/users", get(list_user_ids::<S>))
        .route("/config/{node_id}/hsi", get(list_records::<S>).post(create::<S>))
        .route("/config/{node_id}/hsi/{user_id}", get(get_record::<S>).put(update::<S>).delete(delete_record::<S>))
}

#[derive(Serialize)]
struct UserIdsResponse {
    user_ids: Vec<String>,
}

async fn list_user_ids<S: StoreAdapter>(
    State(state): State<Arc<AppState<S>>>,
    Path(node_id): Path<String>,
) -> Result<Json<UserIdsResponse>, AppError> {
    let user_ids = state.hsi.list_user_ids(&node_id).await?;
    Ok(Json(UserIdsResponse { user_ids }))
}

/// Not an explicit part of the REST table, but `GET /hsi` without a
/// `userId` is the natural listing counterpart to `POST /hsi`; implemented
/// as each user-id's full record, fetched one at a time.
async fn list_records<S: StoreAdapter>(
    State(state): State<Arc<AppState<S>>>,
    Path(node_id): Path<String>,
) -> Result<Json<Vec<HsiRecord>>, AppError> {
    let user_ids = state.hsi.list_user_ids(&node_id).await?;
    let mut records = Vec::with_capacity(user_ids.len());
    for user_id in user_ids {
        records.push(state.hsi.get(&node_id, &user_id).await?);
    }
    Ok(Json(records))
}

async fn create<S: StoreAdapter>(
    State(state): State<Arc<AppState<S>>>,
    Path(node_id): Path<String>,
    Extension(claims): Extension<Claims>,
    Json(config): Json<HsiConfig>,
) -> Result<(StatusCode, Json<HsiRecord>), AppError> {
    let user_id = config.user_id.clone();
    let record = state.hsi.create_or_update(&node_id, &user_id, config, &claims.sub).await?;
    Ok((StatusCode::OK, Json(record)))
}

async fn get_record<S: StoreAdapter>(
    State(state): State<Arc<AppState<S>>>,
    Path((node_id, user_id)): Path<(String, String)>,
) -> Result<Json<HsiRecord>, AppError> {
    Ok(Json(state.hsi.get(&node_id, &user_id).await?))
}

async fn update<S: StoreAdapter>(
    State(state): State<Arc<AppState<S>>>,
    Path((node_id, user_id)): Path<(String, String)>,
    Extension(claims): Extension<Claims>,
    Json(config): Json<HsiConfig>,
) -> Result<Json<HsiRecord>, AppError> {
    let record = state.hsi.create_or_update(&node_id, &user_id, config, &claims.sub).await?;
    Ok(Json(record))
}

async fn delete_record<S: StoreAdapter>(
    State(state): State<Arc<AppState<S>>>,
    Path((node_id, user_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    state.hsi.delete(&node_id, &user_id).await?;
    Ok(StatusCode::OK)
}
