//! HTTP error types for the `gwctl` server.
//!
//! Maps domain errors from `gwctl-core` into the HTTP error taxonomy
//! (spec §7). Every variant produces a JSON body with a machine-readable
//! `error` field and a human-readable `message`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use gwctl_core::error::{
    AuthError, CommandError, FailedEventError, HsiError, RegistryError, SubscriberCountError,
};
use gwctl_store::StoreError;

/// Application-level error returned from HTTP handlers.
///
/// Each variant maps to exactly one wire code from the spec §7 taxonomy —
/// variants are not shared across codes, even when they land on the same
/// status, so the `error` field a client sees is never a lossy rollup.
#[derive(Debug)]
pub enum AppError {
    /// Client sent malformed input.
    BadRequest(String),
    /// No credentials presented.
    Unauthorized(String),
    /// Credentials presented but invalid or expired.
    InvalidAuth(String),
    /// Credentials presented but the token has been revoked.
    Revoked(String),
    /// Authenticated but not permitted.
    Forbidden(String),
    /// Requested resource not found.
    NotFound(String),
    /// Registration conflicts with an existing user.
    UserExists(String),
    /// VLAN id already claimed by a different user on the node.
    VlanConflict(String),
    /// `userId` exceeds the node's configured subscriber count.
    UserIdExceeds(String),
    /// The store is unreachable or the operation timed out.
    Unavailable(String),
    /// Anything else.
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "request.malformed", msg),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "auth.missing", msg),
            Self::InvalidAuth(msg) => (StatusCode::UNAUTHORIZED, "auth.invalid", msg),
            Self::Revoked(msg) => (StatusCode::UNAUTHORIZED, "auth.revoked", msg),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, "auth.forbidden", msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            Self::UserExists(msg) => (StatusCode::CONFLICT, "conflict.user_exists", msg),
            Self::VlanConflict(msg) => (StatusCode::CONFLICT, "conflict.vlan_in_use", msg),
            Self::UserIdExceeds(msg) => (StatusCode::BAD_REQUEST, "hsi.user_id_exceeds", msg),
            Self::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, "store.unavailable", msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg),
        };
        (status, axum::Json(ErrorBody { error: error_type, message })).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DeadlineExceeded | StoreError::Unavailable(_) => Self::Unavailable(err.to_string()),
            StoreError::UnknownLease(_) | StoreError::WatchClosed(_) | StoreError::Malformed(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => Self::InvalidAuth(err.to_string()),
            AuthError::UserExists { .. } => Self::UserExists(err.to_string()),
            AuthError::UserNotFound { .. } => Self::NotFound(err.to_string()),
            AuthError::Missing => Self::Unauthorized(err.to_string()),
            AuthError::InvalidToken { .. } => Self::InvalidAuth(err.to_string()),
            AuthError::Revoked => Self::Revoked(err.to_string()),
            AuthError::Hashing(_) => Self::Internal(err.to_string()),
            AuthError::Store(inner) => inner.into(),
        }
    }
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotRegistered { .. } => Self::NotFound(err.to_string()),
            RegistryError::Malformed { .. } => Self::BadRequest(err.to_string()),
            RegistryError::Store(inner) => inner.into(),
        }
    }
}

impl From<HsiError> for AppError {
    fn from(err: HsiError) -> Self {
        match err {
            HsiError::Malformed { .. } | HsiError::EmptyField { .. } => Self::BadRequest(err.to_string()),
            HsiError::UserIdExceeds { .. } => Self::UserIdExceeds(err.to_string()),
            HsiError::VlanConflict { .. } => Self::VlanConflict(err.to_string()),
            HsiError::NotFound { .. } => Self::NotFound(err.to_string()),
            HsiError::Store(inner) => inner.into(),
        }
    }
}

impl From<CommandError> for AppError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::NoHsiRecord { .. } => Self::NotFound(err.to_string()),
            CommandError::Store(inner) => inner.into(),
        }
    }
}

impl From<FailedEventError> for AppError {
    fn from(err: FailedEventError) -> Self {
        match err {
            FailedEventError::WatchClosed { .. } => Self::Unavailable(err.to_string()),
            FailedEventError::Store(inner) => inner.into(),
        }
    }
}

impl From<SubscriberCountError> for AppError {
    fn from(err: SubscriberCountError) -> Self {
        match err {
            SubscriberCountError::NotFound { .. } => Self::NotFound(err.to_string()),
            SubscriberCountError::Negative { .. } => Self::BadRequest(err.to_string()),
            SubscriberCountError::Store(inner) => inner.into(),
        }
    }
}
