use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use inventory_kernel::client::ixos::{IxosConnector, IxosOptions};
use inventory_kernel::client::{ApiServerSession, ChassisConnector, ChassisSession, ClientError};
use inventory_kernel::models::ChassisCredential;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

const OPS: &str = "/chassis/api/v2/ixos/operations";

/// Châssis HTTP en mémoire ; compte les authentifications et les polls d'opération
#[derive(Default)]
struct VendorStub {
    auths: AtomicU32,
    host_id_polls: AtomicU32,
}

fn api_key(headers: &HeaderMap) -> Option<&str> {
    headers.get("x-api-key").and_then(|v| v.to_str().ok())
}

fn in_progress(id: u32) -> Response {
    (StatusCode::ACCEPTED, Json(json!({ "state": "IN_PROGRESS", "url": format!("{OPS}/{id}") }))).into_response()
}

async fn authenticate(State(stub): State<Arc<VendorStub>>, Json(body): Json<Value>) -> Response {
    if body["username"] != "admin" {
        return (StatusCode::UNAUTHORIZED, "bad credentials").into_response();
    }
    let n = stub.auths.fetch_add(1, Ordering::SeqCst) + 1;
    Json(json!({ "apiKey": format!("key-{n}") })).into_response()
}

async fn chassis(headers: HeaderMap) -> Response {
    if api_key(&headers).is_none() {
        return StatusCode::FORBIDDEN.into_response();
    }
    Json(json!([{ "serialNumber": "SN-1", "state": "Ready" }])).into_response()
}

// La première clé émise est considérée expirée
async fn cards(headers: HeaderMap) -> Response {
    match api_key(&headers) {
        Some("key-1") | None => (StatusCode::UNAUTHORIZED, "expired").into_response(),
        Some(_) => Json(json!([{ "cardNumber": 1 }])).into_response(),
    }
}

async fn operation(State(stub): State<Arc<VendorStub>>, Path(id): Path<u32>) -> Response {
    match id {
        // retrievehostid : un poll IN_PROGRESS puis SUCCESS
        7 => {
            if stub.host_id_polls.fetch_add(1, Ordering::SeqCst) == 0 {
                in_progress(7)
            } else {
                Json(json!({ "state": "SUCCESS", "resultUrl": format!("{OPS}/7/result") })).into_response()
            }
        }
        8 => Json(json!({ "state": "COMPLETED", "resultUrl": "https://chassis/logs/bundle-8.zip" })).into_response(),
        9 => Json(json!({ "state": "ERROR", "message": "card 3 not responding" })).into_response(),
        // jamais terminée
        _ => in_progress(id),
    }
}

fn chassis_routes(stub: Arc<VendorStub>) -> Router {
    Router::new()
        .route("/platform/api/v2/auth/session", post(authenticate))
        .route("/chassis/api/v2/ixos/chassis", get(chassis))
        .route("/chassis/api/v2/ixos/cards", get(cards))
        .route("/chassis/api/v2/ixos/ports", get(|| async { in_progress(9) }))
        .route("/chassis/api/v2/ixos/sensors", get(|| async { in_progress(10) }))
        .route("/chassis/api/v2/ixos/perfcounters", get(|| async { "<html>Service Unavailable</html>" }))
        .route("/chassis/api/v2/ixos/licensing/operations/retrievehostid", post(|| async { in_progress(7) }))
        .route("/chassis/api/v2/ixos/operations/collectlogs", post(|| async { in_progress(8) }))
        .route("/chassis/api/v2/ixos/operations/7/result", get(|| async { Json(json!("HOST-42")) }))
        .route("/chassis/api/v2/ixos/operations/{id}", get(operation))
        .route("/api/v1/sessions", get(|| async { Json(json!([{ "state": "ACTIVE", "applicationType": "ixnlinux" }])) }))
        .with_state(stub)
}

fn standalone_routes(stub: Arc<VendorStub>) -> Router {
    Router::new()
        .route("/ixnetworkweb/api/v1/auth/session", post(authenticate))
        .route(
            "/ixnetworkweb/api/v1/sessions",
            get(|| async { Json(json!([{ "state": "STOPPED", "applicationType": "ixnwindows" }])) }),
        )
        .with_state(stub)
}

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn connector() -> IxosConnector {
    IxosConnector::new(IxosOptions {
        scheme: "http".into(),
        request_timeout: Duration::from_secs(2),
        operation_timeout: Duration::from_millis(150),
        poll_interval: Duration::from_millis(10),
        accept_invalid_certs: false,
    })
    .unwrap()
}

fn credential(addr: SocketAddr) -> ChassisCredential {
    ChassisCredential { ip: addr.to_string(), username: "admin".into(), password: "admin".into() }
}

async fn chassis_stub() -> (Arc<VendorStub>, SocketAddr) {
    let stub = Arc::new(VendorStub::default());
    let addr = serve(chassis_routes(stub.clone())).await;
    (stub, addr)
}

#[tokio::test]
async fn test_requests_carry_the_api_key() {
    let (stub, addr) = chassis_stub().await;
    let session = connector().connect(&credential(addr)).await.unwrap();

    let chassis = session.chassis().await.unwrap();
    assert_eq!(chassis[0]["serialNumber"], "SN-1");
    assert_eq!(stub.auths.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_bad_credentials_fail_to_connect() {
    let (_, addr) = chassis_stub().await;
    let credential = ChassisCredential { username: "guest".into(), ..credential(addr) };
    let err = connector().connect(&credential).await.err().expect("auth must fail");
    assert!(matches!(err, ClientError::Http { status: 401, .. }));
}

#[tokio::test]
async fn test_expired_key_triggers_one_reauthentication() {
    let (stub, addr) = chassis_stub().await;
    let session = connector().connect(&credential(addr)).await.unwrap();

    let cards = session.cards().await.unwrap();
    assert_eq!(cards[0]["cardNumber"], 1);
    assert_eq!(stub.auths.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_async_operation_result_is_fetched() {
    let (stub, addr) = chassis_stub().await;
    let session = connector().connect(&credential(addr)).await.unwrap();

    assert_eq!(session.license_host_id().await.unwrap(), "HOST-42");
    assert_eq!(stub.host_id_polls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_log_collection_returns_result_url_unfetched() {
    let (_, addr) = chassis_stub().await;
    let session = connector().connect(&credential(addr)).await.unwrap();

    assert_eq!(session.collect_logs().await.unwrap(), "https://chassis/logs/bundle-8.zip");
}

#[tokio::test]
async fn test_failed_operation_carries_vendor_message() {
    let (_, addr) = chassis_stub().await;
    let session = connector().connect(&credential(addr)).await.unwrap();

    match session.ports().await {
        Err(ClientError::Operation(message)) => assert_eq!(message, "card 3 not responding"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_stuck_operation_times_out() {
    let (_, addr) = chassis_stub().await;
    let session = connector().connect(&credential(addr)).await.unwrap();

    let started = std::time::Instant::now();
    match session.sensors().await {
        Err(ClientError::Operation(message)) => assert!(message.contains("timeout")),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_non_json_body_is_malformed() {
    let (_, addr) = chassis_stub().await;
    let session = connector().connect(&credential(addr)).await.unwrap();

    assert!(matches!(session.perf_counters().await, Err(ClientError::Malformed(_))));
}

#[tokio::test]
async fn test_client_error_status_is_reported() {
    let (_, addr) = chassis_stub().await;
    let session = connector().connect(&credential(addr)).await.unwrap();

    // licensing/activations n'existe pas sur ce châssis
    assert!(matches!(session.license_activation().await, Err(ClientError::Http { status: 404, .. })));
}

#[tokio::test]
async fn test_standalone_api_server_sessions() {
    let stub = Arc::new(VendorStub::default());
    let addr = serve(standalone_routes(stub.clone())).await;

    let server = connector().connect_api_server(&credential(addr)).await.unwrap();
    let sessions = server.sessions().await.unwrap();
    assert_eq!(sessions[0]["applicationType"], "ixnwindows");
    assert_eq!(stub.auths.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_hosted_api_server_falls_back_to_platform_auth() {
    let (stub, addr) = chassis_stub().await;

    let server = connector().connect_api_server(&credential(addr)).await.unwrap();
    let sessions = server.sessions().await.unwrap();
    assert_eq!(sessions[0]["state"], "ACTIVE");
    assert_eq!(stub.auths.load(Ordering::SeqCst), 1);
}
