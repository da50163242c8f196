//! User administration: `GET/POST/DELETE /api/users[/{u}]`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use gwctl_store::StoreAdapter;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

pub fn router<S: StoreAdapter>() -> Router<Arc<AppState<S>>> {
    Router::new()
        .route("/users", get(list_users::<S>).post(create_user::<S>))
        .route("/users/{username}", get(get_user::<S>).delete(delete_user::<S>))
}

#[derive(Serialize)]
struct UsersResponse {
    usernames: Vec<String>,
}

#[derive(Deserialize)]
struct CreateUserRequest {
    username: String,
    password: String,
}

async fn list_users<S: StoreAdapter>(State(state): State<Arc<AppState<S>>>) -> Result<Json<UsersResponse>, AppError> {
    let usernames = state.auth.list_users().await?;
    Ok(Json(UsersResponse { usernames }))
}

async fn create_user<S: StoreAdapter>(
    State(state): State<Arc<AppState<S>>>,
    Json(body): Json<CreateUserRequest>,
) -> Result<StatusCode, AppError> {
    state.auth.register(&body.username, &body.password).await?;
    Ok(StatusCode::CREATED)
}

async fn get_user<S: StoreAdapter>(
    State(state): State<Arc<AppState<S>>>,
    Path(username): Path<String>,
) -> Result<StatusCode, AppError> {
    state.auth.get_user(&username).await?;
    Ok(StatusCode::OK)
}

async fn delete_user<S: StoreAdapter>(
    State(state): State<Arc<AppState<S>>>,
    Path(username): Path<String>,
) -> Result<StatusCode, AppError> {
    state.auth.delete_user(&username).await?;
    Ok(StatusCode::OK)
}
