//! `gwctl` server entry point.
//!
//! Bootstraps the store connection and every control-plane component, then
//! runs the inbound gRPC server, the HTTPS REST API, and the metrics
//! endpoint concurrently. A stale-node sweeper and a failed-event watcher
//! run alongside as long-lived background tasks, both cancelled on
//! shutdown through a shared signal.

use std::sync::Arc;

use anyhow::Context;
use axum::http::HeaderValue;
use axum::middleware as axum_mw;
use axum::Router;
use gwctl_core::auth::AuthService;
use gwctl_core::commands::CommandPublisher;
use gwctl_core::failed_events::FailedEventPipeline;
use gwctl_core::hsi::HsiService;
use gwctl_core::metrics::MetricRegistry;
use gwctl_core::monitor::MonitorSupervisor;
use gwctl_core::node_registry::NodeRegistry;
use gwctl_core::subscriber_count::SubscriberCountRegistry;
use gwctl_proto::node_management::node_management_server::NodeManagementServer;
use gwctl_store::EtcdStore;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use gwctl_server::config::ServerConfig;
use gwctl_server::grpc::NodeManagementService;
use gwctl_server::middleware::auth_middleware;
use gwctl_server::routes;
use gwctl_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    info!(endpoints = ?config.etcd_endpoints, "gwctl starting");

    let store = Arc::new(
        EtcdStore::connect(&config.etcd_endpoints)
            .await
            .context("failed to connect to etcd")?,
    );

    let state = build_state(Arc::clone(&store), &config)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweeper_handle = {
        let registry = Arc::clone(&state.registry);
        let rx = shutdown_rx.clone();
        tokio::spawn(async move { registry.run_sweeper(rx).await })
    };
    let failed_events_handle = {
        let pipeline = Arc::clone(&state.failed_events);
        let rx = shutdown_rx.clone();
        tokio::spawn(async move { pipeline.run(rx).await })
    };

    let grpc_handle = {
        let registry = Arc::clone(&state.registry);
        let addr = config.grpc_bind_addr();
        let mut rx = shutdown_rx.clone();
        tokio::spawn(async move {
            let service = NodeManagementService::new(registry);
            let server = tonic::transport::Server::builder()
                .add_service(NodeManagementServer::new(service))
                .serve_with_shutdown(addr, async move {
                    let _ = rx.changed().await;
                });
            if let Err(e) = server.await {
                warn!(error = %e, "inbound gRPC server exited with error");
            }
        })
    };

    let metrics_handle = {
        let metrics = Arc::clone(&state.metrics);
        let addr = config.metrics_bind_addr();
        tokio::spawn(async move { serve_metrics(addr, metrics).await })
    };

    let app = build_router(Arc::clone(&state));
    let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(&config.cert_file, &config.key_file)
        .await
        .context("failed to load TLS certificate/key")?;

    info!(addr = %config.https_bind_addr(), "gwctl HTTPS server listening");
    let handle = axum_server::Handle::new();
    let https_server = axum_server::bind_rustls(config.https_bind_addr(), tls_config)
        .handle(handle.clone())
        .serve(app.into_make_service());

    let shutdown_watcher = {
        let handle = handle.clone();
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            wait_for_shutdown_signal().await;
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
            handle.graceful_shutdown(Some(std::time::Duration::from_secs(10)));
        })
    };

    https_server.await.context("HTTPS server error")?;
    let _ = tokio::join!(shutdown_watcher, sweeper_handle, failed_events_handle, grpc_handle, metrics_handle);
    info!("gwctl server stopped");
    Ok(())
}

fn build_state(store: Arc<EtcdStore>, config: &ServerConfig) -> anyhow::Result<Arc<AppState<EtcdStore>>> {
    let metrics = MetricRegistry::new().context("failed to register metric families")?;
    let metrics = Arc::new(metrics);
    let monitors = MonitorSupervisor::new(Arc::clone(&metrics));
    let registry = Arc::new(NodeRegistry::new(Arc::clone(&store), monitors.clone()));
    let subscriber_counts = Arc::new(SubscriberCountRegistry::new(Arc::clone(&store)));
    let hsi = Arc::new(HsiService::new(Arc::clone(&store), Arc::clone(&subscriber_counts)));
    let commands = Arc::new(CommandPublisher::new(Arc::clone(&store), Arc::clone(&hsi)));
    let failed_events = Arc::new(FailedEventPipeline::new(Arc::clone(&store)));
    let auth = Arc::new(AuthService::new(Arc::clone(&store), config.jwt_secret.as_bytes()));

    Ok(Arc::new(AppState {
        store,
        auth,
        registry,
        monitors,
        hsi,
        commands,
        failed_events,
        subscriber_counts,
        metrics,
    }))
}

fn build_router(state: Arc<AppState<EtcdStore>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
        ])
        .allow_headers([axum::http::header::CONTENT_TYPE, axum::http::header::AUTHORIZATION]);

    Router::new()
        .nest("/api", routes::router::<EtcdStore>())
        .route_layer(axum_mw::from_fn_with_state(Arc::clone(&state), auth_middleware::<EtcdStore>))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=63072000; includeSubDomains"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::HeaderName::from_static("x-xss-protection"),
            HeaderValue::from_static("1; mode=block"),
        ))
        .with_state(state)
}

/// The metrics endpoint is a separate, unauthenticated listener (spec §6)
/// rather than a route nested under the main router, matching the
/// original's own dedicated Prometheus port.
async fn serve_metrics(addr: std::net::SocketAddr, metrics: Arc<MetricRegistry>) {
    let app = Router::new().route(
        "/metrics",
        axum::routing::get(move || {
            let metrics = Arc::clone(&metrics);
            async move { metrics.gather_text() }
        }),
    );
    match TcpListener::bind(addr).await {
        Ok(listener) => {
            info!(%addr, "metrics endpoint listening");
            if let Err(e) = axum::serve(listener, app).await {
                warn!(error = %e, "metrics endpoint exited with error");
            }
        }
        Err(e) => warn!(%addr, error = %e, "failed to bind metrics endpoint"),
    }
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            sig.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
