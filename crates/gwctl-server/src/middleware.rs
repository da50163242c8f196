//! Authentication middleware for the `gwctl` server.
//!
//! Extracts the `Authorization: Bearer <jwt>` header, validates it against
//! [`gwctl_core::auth::AuthService`] (signature, expiry, and revocation),
//! and injects the decoded claims into the request extensions for
//! downstream handlers.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use gwctl_core::auth::Claims;
use gwctl_core::error::AuthError;
use gwctl_store::StoreAdapter;

use crate::error::AppError;
use crate::state::AppState;

/// Routes that never require a session.
const PUBLIC_PATHS: &[&str] = &["/api/health", "/api/login", "/api/register"];

/// Validates the bearer token and injects [`Claims`] into request
/// extensions; public paths bypass auth entirely.
pub async fn auth_middleware<S: StoreAdapter>(
    State(state): State<Arc<AppState<S>>>,
    mut req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_owned();
    if PUBLIC_PATHS.contains(&path.as_str()) {
        return next.run(req).await;
    }

    let token = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_owned);

    let Some(token) = token else {
        return unauthorized("auth.missing", "missing authorization header");
    };

    match state.auth.authenticate(&token).await {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        // A store error during the revocation lookup is never treated as
        // an auth decision — fail closed with a 500 instead of a 401.
        Err(AuthError::Store(e)) => AppError::from(e).into_response(),
        Err(AuthError::Revoked) => unauthorized("auth.revoked", "token has been revoked"),
        Err(_) => unauthorized("auth.invalid", "invalid or expired token"),
    }
}

fn unauthorized(error: &'static str, message: &'static str) -> Response {
    (StatusCode::UNAUTHORIZED, axum::Json(serde_json::json!({"error": error, "message": message}))).into_response()
}

/// Extracted from request extensions by handlers that need the caller's
/// identity (currently only for audit logging — gwctl has no per-route
/// policy engine, spec Non-goals §2).
pub type AuthContext = Claims;
