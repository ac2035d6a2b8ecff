use super::*;
use crate::bus::{MockPublisher, TOPIC_LOG_INFO};
use crate::config::DownstreamConfig;
use axum::body::Body;
use axum::Json;
use http::Request;
use serde_json::json;
use std::net::SocketAddr;
use tower::ServiceExt;

/// Address nothing listens on.
fn closed_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Serve `app` on an ephemeral port.
async fn spawn_downstream(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn downstream_at(addr: SocketAddr, timeout_secs: u64) -> DownstreamConfig {
    DownstreamConfig {
        auth_url: format!("http://{}/authenticate", addr),
        log_url: format!("http://{}/log", addr),
        mail_url: format!("http://{}/send", addr),
        log_rpc_addr: addr.to_string(),
        log_grpc_addr: addr.to_string(),
        timeout_secs,
    }
}

fn gateway(downstream: DownstreamConfig, publisher: Arc<MockPublisher>) -> Router {
    let dispatcher = ActionDispatcher::new(downstream, TOPIC_LOG_INFO, publisher).unwrap();
    router(Arc::new(dispatcher))
}

async fn submit(app: Router, uri: &str, body: String) -> (StatusCode, ActionResponse) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

fn action(action: &str, payload: serde_json::Value) -> String {
    json!({"action": action, "payload": payload}).to_string()
}

// ============================================================================
// Request validation
// ============================================================================

#[test]
fn test_parse_each_action() {
    let log = json!({"name": "event", "data": "x"});
    let cases = [
        ("log", ActionRequest::Log(LogPayload { name: "event".into(), data: "x".into() })),
        ("log-rpc", ActionRequest::LogRpc(LogPayload { name: "event".into(), data: "x".into() })),
        ("log-grpc", ActionRequest::LogGrpc(LogPayload { name: "event".into(), data: "x".into() })),
        ("log-event", ActionRequest::LogEvent(LogPayload { name: "event".into(), data: "x".into() })),
    ];
    for (name, expected) in cases {
        let parsed = ActionRequest::from_slice(action(name, log.clone()).as_bytes()).unwrap();
        assert_eq!(parsed, expected);
        assert_eq!(parsed.action(), name);
    }

    let mail = ActionRequest::from_slice(
        action(
            "mail",
            json!({"from": "a@example.com", "to": "b@example.com", "subject": "hi", "message": "hello"}),
        )
        .as_bytes(),
    )
    .unwrap();
    assert!(matches!(mail, ActionRequest::Mail(ref p) if p.to == "b@example.com"));
}

#[tokio::test]
async fn test_unknown_action_is_400() {
    let app = gateway(downstream_at(closed_addr(), 1), Arc::new(MockPublisher::new()));

    let (status, body) = submit(app, "/handle", action("shout", json!({}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.error);
    assert_eq!(body.message, "unknown action");
}

#[tokio::test]
async fn test_malformed_body_is_400() {
    let app = gateway(downstream_at(closed_addr(), 1), Arc::new(MockPublisher::new()));

    let (status, body) = submit(app, "/handle", "{not json".to_string()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.error);
}

#[tokio::test]
async fn test_bad_payload_is_400() {
    let app = gateway(downstream_at(closed_addr(), 1), Arc::new(MockPublisher::new()));

    let (status, body) = submit(app, "/handle", action("log", json!({"name": "only"}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.message.contains("invalid log payload"));
}

// ============================================================================
// Queue path
// ============================================================================

#[tokio::test]
async fn test_log_event_publishes_on_info_topic() {
    let publisher = Arc::new(MockPublisher::new());
    let app = gateway(downstream_at(closed_addr(), 1), publisher.clone());

    let (status, body) = submit(
        app,
        "/handle",
        action("log-event", json!({"name": "event", "data": "queued"})),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(!body.error);
    assert_eq!(body.message, "logged via RabbitMQ");

    let published = publisher.take_published().await;
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, "log.INFO");
    assert_eq!(published[0].1.name, "event");
    assert_eq!(published[0].1.data, "queued");
}

#[tokio::test]
async fn test_publish_failure_is_500() {
    let publisher = Arc::new(MockPublisher::new());
    publisher.set_fail_on_publish(true).await;
    let app = gateway(downstream_at(closed_addr(), 1), publisher);

    let (status, body) = submit(
        app,
        "/handle",
        action("log-event", json!({"name": "event", "data": "x"})),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.error);
}

// ============================================================================
// Downstream failures
// ============================================================================

#[tokio::test]
async fn test_unreachable_log_service_is_503() {
    let app = gateway(downstream_at(closed_addr(), 2), Arc::new(MockPublisher::new()));

    let (status, body) = submit(
        app,
        "/handle",
        action("log", json!({"name": "event", "data": "x"})),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.error);
    assert!(body.message.contains("connection"));
}

#[tokio::test]
async fn test_unreachable_rpc_and_grpc_are_503() {
    let addr = closed_addr();

    for name in ["log-rpc", "log-grpc"] {
        let app = gateway(downstream_at(addr, 2), Arc::new(MockPublisher::new()));
        let (status, body) = submit(
            app,
            "/handle",
            action(name, json!({"name": "event", "data": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{}", name);
        assert!(body.message.contains("connection"), "{}", name);
    }
}

#[tokio::test]
async fn test_log_service_error_status_is_502() {
    let addr = spawn_downstream(Router::new().route(
        "/log",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "disk full") }),
    ))
    .await;
    let app = gateway(downstream_at(addr, 2), Arc::new(MockPublisher::new()));

    let (status, body) = submit(
        app,
        "/handle",
        action("log", json!({"name": "event", "data": "x"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body.message.contains("disk full"));
}

#[tokio::test]
async fn test_slow_log_service_is_504() {
    let addr = spawn_downstream(Router::new().route(
        "/log",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            StatusCode::ACCEPTED
        }),
    ))
    .await;
    let app = gateway(downstream_at(addr, 1), Arc::new(MockPublisher::new()));

    let (status, body) = submit(
        app,
        "/handle",
        action("log", json!({"name": "event", "data": "x"})),
    )
    .await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert!(body.error);
}

// ============================================================================
// HTTP downstreams
// ============================================================================

#[tokio::test]
async fn test_auth_error_envelope_keeps_status() {
    let addr = spawn_downstream(Router::new().route(
        "/authenticate",
        post(|| async {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": true, "message": "invalid credentials"})),
            )
        }),
    ))
    .await;
    let app = gateway(downstream_at(addr, 2), Arc::new(MockPublisher::new()));

    let (status, body) = submit(
        app,
        "/handle",
        action("auth", json!({"email": "admin@example.com", "password": "wrong"})),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.error);
    assert_eq!(body.message, "invalid credentials");
}

#[tokio::test]
async fn test_auth_plain_error_keeps_status() {
    let addr = spawn_downstream(Router::new().route(
        "/authenticate",
        post(|| async { (StatusCode::BAD_REQUEST, "invalid credentials") }),
    ))
    .await;
    let app = gateway(downstream_at(addr, 2), Arc::new(MockPublisher::new()));

    let (status, body) = submit(
        app,
        "/handle",
        action("auth", json!({"email": "admin@example.com", "password": "wrong"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.error);
    assert_eq!(body.message, "invalid credentials");
}

#[tokio::test]
async fn test_auth_success_passes_envelope_through() {
    let addr = spawn_downstream(Router::new().route(
        "/authenticate",
        post(|Json(creds): Json<AuthPayload>| async move {
            (
                StatusCode::ACCEPTED,
                Json(json!({
                    "error": false,
                    "message": format!("Logged in user {}", creds.email),
                    "data": {"email": creds.email},
                })),
            )
        }),
    ))
    .await;
    let app = gateway(downstream_at(addr, 2), Arc::new(MockPublisher::new()));

    let (status, body) = submit(
        app,
        "/handle",
        action("auth", json!({"email": "admin@example.com", "password": "verysecret"})),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body.message, "Logged in user admin@example.com");
    assert_eq!(body.data.unwrap()["email"], "admin@example.com");
}

#[tokio::test]
async fn test_mail_reports_recipient() {
    let addr = spawn_downstream(
        Router::new().route("/send", post(|| async { StatusCode::ACCEPTED })),
    )
    .await;
    let app = gateway(downstream_at(addr, 2), Arc::new(MockPublisher::new()));

    let (status, body) = submit(
        app,
        "/handle",
        action(
            "mail",
            json!({"from": "me@example.com", "to": "you@example.com", "subject": "Hi", "message": "Hello"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body.message, "Message sent to you@example.com");
}

// ============================================================================
// Routes
// ============================================================================

#[tokio::test]
async fn test_broker_root() {
    let app = gateway(downstream_at(closed_addr(), 1), Arc::new(MockPublisher::new()));

    let (status, body) = submit(app, "/", String::new()).await;

    assert_eq!(status, StatusCode::OK);
    assert!(!body.error);
    assert_eq!(body.message, "Hit the broker");
}

#[tokio::test]
async fn test_log_grpc_route_forces_grpc_path() {
    let publisher = Arc::new(MockPublisher::new());
    let app = gateway(downstream_at(closed_addr(), 2), publisher.clone());

    // Declared as a queue action, but the route always uses gRPC
    let (status, body) = submit(
        app,
        "/log-grpc",
        action("log-event", json!({"name": "event", "data": "x"})),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.message.contains("log service (grpc)"));
    assert_eq!(publisher.published_count().await, 0);
}

#[tokio::test]
async fn test_cors_preflight_allows_http_origin() {
    let app = gateway(downstream_at(closed_addr(), 1), Arc::new(MockPublisher::new()));

    let req = Request::builder()
        .method("OPTIONS")
        .uri("/handle")
        .header("origin", "http://localhost:8081")
        .header("access-control-request-method", "POST")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();

    assert_eq!(
        resp.headers().get("access-control-allow-origin").unwrap(),
        "http://localhost:8081"
    );
}
