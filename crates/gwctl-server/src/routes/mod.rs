//! REST route modules, one per resource group in spec §6's API table.

pub mod auth;
pub mod commands;
pub mod failed_events;
pub mod health;
pub mod hsi;
pub mod nodes;
pub mod subscriber_count;
pub mod users;

use std::sync::Arc;

use axum::Router;
use gwctl_store::StoreAdapter;

use crate::state::AppState;

/// Builds the full `/api` router. `auth::router`'s login/register live
/// here too, unauthenticated — the auth-skip list in
/// [`crate::middleware::auth_middleware`] is what actually excludes them
/// from the JWT check, not a separate mount point.
pub fn router<S: StoreAdapter>() -> Router<Arc<AppState<S>>> {
    Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(nodes::router())
        .merge(subscriber_count::router())
        .merge(users::router())
        .merge(hsi::router())
        .merge(commands::router())
        .merge(failed_events::router())
}
