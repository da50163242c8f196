//! End-to-end scenarios against the REST API, backed by an in-memory store.
//!
//! Each test drives the full router (auth middleware included) the way a
//! real client would, rather than calling service methods directly.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
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
use gwctl_server::middleware::auth_middleware;
use gwctl_server::routes;
use gwctl_server::state::AppState;
use gwctl_store::MemoryStore;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

fn test_state() -> Arc<AppState<MemoryStore>> {
    let store = Arc::new(MemoryStore::new());
    let metrics = Arc::new(MetricRegistry::new().unwrap());
    let monitors = MonitorSupervisor::new(Arc::clone(&metrics));
    let registry = Arc::new(NodeRegistry::new(Arc::clone(&store), monitors.clone()));
    let subscriber_counts = Arc::new(SubscriberCountRegistry::new(Arc::clone(&store)));
    let hsi = Arc::new(HsiService::new(Arc::clone(&store), Arc::clone(&subscriber_counts)));
    let commands = Arc::new(CommandPublisher::new(Arc::clone(&store), Arc::clone(&hsi)));
    let failed_events = Arc::new(FailedEventPipeline::new(Arc::clone(&store)));
    let auth = Arc::new(AuthService::new(Arc::clone(&store), b"integration-test-secret-value!!"));

    Arc::new(AppState {
        store,
        auth,
        registry,
        monitors,
        hsi,
        commands,
        failed_events,
        subscriber_counts,
        metrics,
    })
}

fn test_router(state: Arc<AppState<MemoryStore>>) -> Router {
    Router::new()
        .nest("/api", routes::router::<MemoryStore>())
        .route_layer(axum_mw::from_fn_with_state(Arc::clone(&state), auth_middleware::<MemoryStore>))
        .with_state(state)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, body)
}

fn json_req(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri).header("content-type", "application/json");
    if let Some(t) = token {
        builder = builder.header("authorization", format!("Bearer {t}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_req(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(t) = token {
        builder = builder.header("authorization", format!("Bearer {t}"));
    }
    builder.body(Body::empty()).unwrap()
}

async fn login(app: &Router, username: &str, password: &str) -> String {
    let (status, body) =
        send(app, json_req("POST", "/api/register", None, json!({"username": username, "password": password}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) =
        send(app, json_req("POST", "/api/login", None, json!({"username": username, "password": password}))).await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn unauthenticated_request_is_rejected() {
    let app = test_router(test_state());
    let (status, body) = send(&app, get_req("/api/nodes", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "auth.missing");
}

#[tokio::test]
async fn health_check_is_public_and_reports_store_reachable() {
    let app = test_router(test_state());
    let (status, body) = send(&app, get_req("/api/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "reachable");
}

#[tokio::test]
async fn register_login_logout_revokes_session() {
    let app = test_router(test_state());
    let token = login(&app, "alice", "hunter2").await;

    let (status, _) = send(&app, get_req("/api/nodes", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, json_req("POST", "/api/logout", Some(&token), json!({}))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, get_req("/api/nodes", Some(&token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "auth.revoked");
}

#[tokio::test]
async fn hsi_create_then_conflicting_vlan_is_rejected() {
    let app = test_router(test_state());
    let token = login(&app, "admin", "s3cret!!").await;

    let record = json!({
        "user_id": "1", "vlan_id": "100", "account": "acct1", "password": "pw1",
        "pool_start": "10.0.0.10", "pool_end": "10.0.0.20",
        "dhcp_subnet": "255.255.255.0", "dhcp_gateway": "10.0.0.1",
    });
    let (status, _) = send(&app, json_req("PUT", "/api/config/n1/hsi/1", Some(&token), record)).await;
    assert_eq!(status, StatusCode::OK);

    let conflicting = json!({
        "user_id": "2", "vlan_id": "100", "account": "acct2", "password": "pw2",
        "pool_start": "10.0.0.30", "pool_end": "10.0.0.40",
        "dhcp_subnet": "255.255.255.0", "dhcp_gateway": "10.0.0.1",
    });
    let (status, body) = send(&app, json_req("PUT", "/api/config/n1/hsi/2", Some(&token), conflicting)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict.vlan_in_use");
}

#[tokio::test]
async fn subscriber_count_caps_hsi_user_ids() {
    let app = test_router(test_state());
    let token = login(&app, "admin", "s3cret!!").await;

    let (status, _) = send(
        &app,
        json_req("PUT", "/api/nodes/n1/subscriber-count", Some(&token), json!({"subscriber_count": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let record = json!({
        "user_id": "7", "vlan_id": "200", "account": "acct7", "password": "pw7",
        "pool_start": "10.0.1.10", "pool_end": "10.0.1.20",
        "dhcp_subnet": "255.255.255.0", "dhcp_gateway": "10.0.1.1",
    });
    let (status, body) = send(&app, json_req("PUT", "/api/config/n1/hsi/7", Some(&token), record)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "hsi.user_id_exceeds");
}

#[tokio::test]
async fn dial_without_hsi_record_returns_not_found() {
    let app = test_router(test_state());
    let token = login(&app, "admin", "s3cret!!").await;

    let (status, body) =
        send(&app, json_req("POST", "/api/pppoe/dial", Some(&token), json!({"node_id": "n1", "user_id": "1"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn dial_after_hsi_create_succeeds_and_command_is_published() {
    let state = test_state();
    let app = test_router(Arc::clone(&state));
    let token = login(&app, "admin", "s3cret!!").await;

    let record = json!({
        "user_id": "1", "vlan_id": "300", "account": "acct1", "password": "pw1",
        "pool_start": "10.0.2.10", "pool_end": "10.0.2.20",
        "dhcp_subnet": "255.255.255.0", "dhcp_gateway": "10.0.2.1",
    });
    let (status, _) = send(&app, json_req("PUT", "/api/config/n1/hsi/1", Some(&token), record)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) =
        send(&app, json_req("POST", "/api/pppoe/dial", Some(&token), json!({"node_id": "n1", "user_id": "1"}))).await;
    assert_eq!(status, StatusCode::OK);

    let raw = state.store.get("commands/n1/pppoe_dial_1", std::time::Duration::from_secs(1)).await.unwrap();
    assert!(raw.is_some());
}

#[tokio::test]
async fn node_register_then_heartbeat_then_delete() {
    let state = test_state();
    let app = test_router(Arc::clone(&state));
    let token = login(&app, "admin", "s3cret!!").await;

    state.registry.register("n1", "10.0.0.5", "1.0").await.unwrap();
    state.registry.heartbeat("n1", "10.0.0.5", 42).await.unwrap();

    let (status, body) = send(&app, get_req("/api/nodes", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, _) = send(&app, Request::builder().method("DELETE").uri("/api/nodes/n1")
        .header("authorization", format!("Bearer {token}")).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, get_req("/api/nodes", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn failed_events_fan_in_is_queryable_by_node_and_type() {
    let state = test_state();
    let app = test_router(Arc::clone(&state));
    let token = login(&app, "admin", "s3cret!!").await;

    let (tx, rx) = tokio::sync::watch::channel(false);
    let pipeline = Arc::clone(&state.failed_events);
    let handle = tokio::spawn(async move { pipeline.run(rx).await });
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    state
        .store
        .put(
            "failed_events/n1",
            br#"{"event_type":"pppoe_dial","node_id":"n1","user_id":"1"}"#,
            gwctl_store::PutOptions::default(),
            std::time::Duration::from_secs(1),
        )
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let (status, body) = send(&app, get_req("/api/failed-events/n1?event_type=pppoe_dial", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let _ = tx.send(true);
    let _ = handle.await;
}
