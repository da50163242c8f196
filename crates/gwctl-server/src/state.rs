//! Shared application state for the `gwctl` server.
//!
//! A single [`AppState`] is constructed at startup and shared across all
//! Axum handlers and the inbound gRPC service via `Arc`.

use std::sync::Arc;

use gwctl_core::auth::AuthService;
use gwctl_core::commands::CommandPublisher;
use gwctl_core::failed_events::FailedEventPipeline;
use gwctl_core::hsi::HsiService;
use gwctl_core::metrics::MetricRegistry;
use gwctl_core::monitor::MonitorSupervisor;
use gwctl_core::node_registry::NodeRegistry;
use gwctl_core::subscriber_count::SubscriberCountRegistry;
use gwctl_store::StoreAdapter;

/// Shared application state passed to all HTTP handlers and the inbound
/// gRPC service.
pub struct AppState<S: StoreAdapter> {
    /// Held directly (in addition to being threaded through every
    /// component below) so the health check can probe the store with its
    /// own 2-second deadline (spec §5) rather than borrowing a component's.
    pub store: Arc<S>,
    pub auth: Arc<AuthService<S>>,
    pub registry: Arc<NodeRegistry<S>>,
    pub monitors: Arc<MonitorSupervisor>,
    pub hsi: Arc<HsiService<S>>,
    pub commands: Arc<CommandPublisher<S>>,
    pub failed_events: Arc<FailedEventPipeline<S>>,
    pub subscriber_counts: Arc<SubscriberCountRegistry<S>>,
    pub metrics: Arc<MetricRegistry>,
}

impl<S: StoreAdapter> std::fmt::Debug for AppState<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
