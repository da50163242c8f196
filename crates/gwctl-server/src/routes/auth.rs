//! Session routes: `/api/login`, `/api/register`, `/api/logout`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Extension, Json, Router};
use gwctl_core::auth::Claims;
use gwctl_store::StoreAdapter;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

pub fn router<S: StoreAdapter>() -> Router<Arc<AppState<S>>> {
    Router::new()
        .route("/login", post(login::<S>))
        .route("/register", post(register::<S>))
        .route("/logout", post(logout::<S>))
}

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub username: String,
    pub expires_at: i64,
}

async fn login<S: StoreAdapter>(
    State(state): State<Arc<AppState<S>>>,
    Json(body): Json<CredentialsRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let issued = state.auth.login(&body.username, &body.password).await?;
    Ok(Json(TokenResponse { token: issued.token, username: issued.username, expires_at: issued.expires_at }))
}

async fn register<S: StoreAdapter>(
    State(state): State<Arc<AppState<S>>>,
    Json(body): Json<CredentialsRequest>,
) -> Result<StatusCode, AppError> {
    state.auth.register(&body.username, &body.password).await?;
    Ok(StatusCode::CREATED)
}

/// `Authorization: Bearer <token>` is re-extracted from the raw header
/// rather than relying on the already-decoded [`Claims`] — the claims
/// don't carry the token string itself, only who it's for.
async fn logout<S: StoreAdapter>(
    State(state): State<Arc<AppState<S>>>,
    headers: axum::http::HeaderMap,
    Extension(_claims): Extension<Claims>,
) -> Result<StatusCode, AppError> {
    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("missing authorization header".to_string()))?;
    state.auth.logout(token).await?;
    Ok(StatusCode::OK)
}
