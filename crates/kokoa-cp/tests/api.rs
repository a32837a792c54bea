#![allow(clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use kokoa_core::fingerprint;
use kokoa_cp::auth::BootstrapSecret;
use kokoa_cp::http::{AppState, RateLimitConfig, RateLimiter, build_router};
use kokoa_cp::storage::ControlPlaneDatabase;

const BOOTSTRAP: &str = "enroll-secret";

async fn state_with(bootstrap: &str, rate_limiter: Option<Arc<RateLimiter>>) -> AppState {
    AppState {
        db: ControlPlaneDatabase::open_in_memory().await.unwrap(),
        bootstrap: BootstrapSecret::new(bootstrap),
        rate_limiter,
    }
}

async fn state() -> AppState {
    state_with(BOOTSTRAP, None).await
}

/// Send a request and return (status, parsed JSON body).
async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(request).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, value)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_with_token(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn enroll(headers: &[(&str, &str)], body: &'static str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/v1/edge-nodes/register")
        .header("content-type", "application/json");
    for &(name, value) in headers {
        builder = builder.header(name, value);
    }
    builder.body(Body::from(body)).unwrap()
}

async fn create_origin(app: &Router, name: &str, wg_ip: &str) -> String {
    let (status, body) = send(
        app,
        post_json("/api/v1/origins", &json!({"name": name, "wg_ip": wg_ip})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_str().unwrap().to_string()
}

async fn create_route(app: &Router, hostname: &str, origin_id: &str, port: u16) {
    let (status, body) = send(
        app,
        post_json(
            "/api/v1/routes",
            &json!({"hostname": hostname, "origin_id": origin_id, "target_port": port}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
}

async fn enrolled_token(app: &Router) -> String {
    let auth = format!("Bearer {BOOTSTRAP}");
    let (status, body) = send(app, enroll(&[("authorization", auth.as_str())], "{}")).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["token"].as_str().unwrap().to_string()
}

// === Health and fallback ===

#[tokio::test]
async fn healthz_reports_ok() {
    let app = build_router(state().await);
    let (status, body) = send(&app, get("/healthz")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn unknown_path_returns_json_404() {
    let app = build_router(state().await);
    let (status, body) = send(&app, get("/api/v1/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not found");
}

// === Origins ===

#[tokio::test]
async fn create_origin_returns_created_entity() {
    let app = build_router(state().await);
    let (status, body) = send(
        &app,
        post_json(
            "/api/v1/origins",
            &json!({"name": "o1", "wg_ip": "10.0.0.2", "wireguard_public_key": "pk"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["name"], "o1");
    assert_eq!(body["wg_ip"], "10.0.0.2");
    assert_eq!(body["wireguard_public_key"], "pk");
    assert!(body["wireguard_private_key_encrypted"].is_null());
    assert!(body["created_at"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn create_origin_validation_errors() {
    let app = build_router(state().await);

    let (status, body) = send(&app, post_json("/api/v1/origins", &json!({"wg_ip": "10.0.0.2"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "name is required");

    let (status, body) = send(
        &app,
        post_json("/api/v1/origins", &json!({"name": "o1", "wg_ip": "ten"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "wg_ip must be a valid IP address");

    let (_, list) = send(&app, get("/api/v1/origins/list")).await;
    assert_eq!(list, json!([]));
}

#[tokio::test]
async fn malformed_json_is_400() {
    let app = build_router(state().await);
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/origins")
        .header("content-type", "application/json")
        .body(Body::from("{\"name\":"))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid json");
}

#[tokio::test]
async fn non_json_content_type_is_415() {
    let app = build_router(state().await);
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/origins")
        .header("content-type", "text/plain")
        .body(Body::from(r#"{"name":"o1","wg_ip":"10.0.0.2"}"#))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn duplicate_origin_is_409() {
    let app = build_router(state().await);
    create_origin(&app, "o1", "10.0.0.2").await;

    let (status, body) = send(
        &app,
        post_json("/api/v1/origins", &json!({"name": "o1", "wg_ip": "10.0.0.9"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());

    let (status, _) = send(
        &app,
        post_json("/api/v1/origins", &json!({"name": "o2", "wg_ip": "10.0.0.2"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn origins_list_newest_first() {
    let app = build_router(state().await);
    create_origin(&app, "first", "10.0.0.2").await;
    create_origin(&app, "second", "10.0.0.3").await;

    let (status, body) = send(&app, get("/api/v1/origins/list")).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["second", "first"]);
}

// === Routes ===

#[tokio::test]
async fn route_to_unknown_origin_is_404() {
    let app = build_router(state().await);
    let (status, body) = send(
        &app,
        post_json(
            "/api/v1/routes",
            &json!({"hostname": "a.x.com", "origin_id": "missing", "target_port": 80}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().ends_with("not found"));

    let (_, list) = send(&app, get("/api/v1/routes/list")).await;
    assert_eq!(list, json!([]));
}

#[tokio::test]
async fn route_validation_errors() {
    let app = build_router(state().await);
    let origin_id = create_origin(&app, "o1", "10.0.0.2").await;

    for (hostname, port, message) in [
        ("a.x.com", 0, "target_port must be between 1 and 65535"),
        ("a.x.com", 65536, "target_port must be between 1 and 65535"),
        ("localhost", 80, "hostname is invalid"),
        ("", 80, "hostname and origin_id are required"),
    ] {
        let (status, body) = send(
            &app,
            post_json(
                "/api/v1/routes",
                &json!({"hostname": hostname, "origin_id": origin_id, "target_port": port}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{hostname}:{port}");
        assert_eq!(body["error"], message);
    }
}

#[tokio::test]
async fn duplicate_hostname_is_409() {
    let app = build_router(state().await);
    let origin_id = create_origin(&app, "o1", "10.0.0.2").await;
    create_route(&app, "a.x.com", &origin_id, 8080).await;

    let (status, _) = send(
        &app,
        post_json(
            "/api/v1/routes",
            &json!({"hostname": "a.x.com", "origin_id": origin_id, "target_port": 9090}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn trailing_dot_hostname_is_stored_bare_and_conflicts() {
    let app = build_router(state().await);
    let origin_id = create_origin(&app, "o1", "10.0.0.2").await;

    let (status, body) = send(
        &app,
        post_json(
            "/api/v1/routes",
            &json!({"hostname": "app.example.com.", "origin_id": origin_id, "target_port": 8080}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["hostname"], "app.example.com");

    let (status, _) = send(
        &app,
        post_json(
            "/api/v1/routes",
            &json!({"hostname": "app.example.com", "origin_id": origin_id, "target_port": 9090}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = send(&app, get("/api/v1/routes/list")).await;
    let hostnames: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["hostname"].as_str().unwrap())
        .collect();
    assert_eq!(hostnames, ["app.example.com"]);
}

#[tokio::test]
async fn routes_list_sorted_by_hostname_with_origin_fields() {
    let app = build_router(state().await);
    let origin_id = create_origin(&app, "o1", "10.0.0.2").await;
    create_route(&app, "z.x.com", &origin_id, 80).await;
    create_route(&app, "a.x.com", &origin_id, 81).await;

    let (status, body) = send(&app, get("/api/v1/routes/list")).await;
    assert_eq!(status, StatusCode::OK);
    let routes = body.as_array().unwrap();
    assert_eq!(routes[0]["hostname"], "a.x.com");
    assert_eq!(routes[0]["origin_name"], "o1");
    assert_eq!(routes[0]["wg_ip"], "10.0.0.2");
    assert_eq!(routes[1]["hostname"], "z.x.com");
}

// === Enrollment ===

#[tokio::test]
async fn enroll_without_configured_bootstrap_is_503() {
    let app = build_router(state_with("", None).await);
    let (status, body) = send(&app, enroll(&[("authorization", "Bearer anything")], "{}")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "bootstrap token is not configured");
}

#[tokio::test]
async fn enroll_with_wrong_or_absent_bootstrap_is_401_and_creates_nothing() {
    let app = build_router(state().await);

    let (status, _) = send(&app, enroll(&[("authorization", "Bearer wrong")], "{}")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, enroll(&[], "{}")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, nodes) = send(&app, get("/api/v1/edge-nodes/list")).await;
    assert_eq!(nodes, json!([]));
}

#[tokio::test]
async fn enroll_accepts_either_bootstrap_header() {
    let app = build_router(state().await);

    let auth = format!("Bearer {BOOTSTRAP}");
    let (status, body) = send(
        &app,
        enroll(&[("authorization", auth.as_str())], r#"{"name":"edge-1"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["edge_node_id"].is_string());
    assert_eq!(body["token"].as_str().unwrap().len(), 64);

    let (status, _) = send(&app, enroll(&[("x-bootstrap-token", BOOTSTRAP)], "")).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, nodes) = send(&app, get("/api/v1/edge-nodes/list")).await;
    let nodes = nodes.as_array().unwrap();
    assert_eq!(nodes.len(), 2);
    assert!(nodes[0]["name"].is_null());
    assert_eq!(nodes[1]["name"], "edge-1");
    for node in nodes {
        assert!(node.get("token_hash").is_none(), "token hash leaked: {node}");
    }
}

#[tokio::test]
async fn node_token_cannot_enroll() {
    let app = build_router(state().await);
    let token = enrolled_token(&app).await;

    let auth = format!("Bearer {token}");
    let (status, _) = send(&app, enroll(&[("authorization", auth.as_str())], "{}")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// === Config polling ===

#[tokio::test]
async fn poll_requires_valid_node_token() {
    let app = build_router(state().await);
    enrolled_token(&app).await;

    let (status, body) = send(&app, get("/api/v1/edge-nodes/me/config")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "missing bearer token");

    let (status, body) = send(
        &app,
        get_with_token("/api/v1/edge-nodes/me/config", "0".repeat(64).as_str()),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid token");
}

#[tokio::test]
async fn bootstrap_secret_cannot_poll() {
    let app = build_router(state().await);
    let (status, _) = send(
        &app,
        get_with_token("/api/v1/edge-nodes/me/config", BOOTSTRAP),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn poll_serves_worked_example() {
    let app = build_router(state().await);
    let o1 = create_origin(&app, "o1", "10.0.0.2").await;
    let o2 = create_origin(&app, "o2", "10.0.0.3").await;
    create_route(&app, "b.x.com", &o1, 8080).await;
    create_route(&app, "a.x.com", &o2, 8081).await;
    let token = enrolled_token(&app).await;

    let (status, body) = send(
        &app,
        get_with_token("/api/v1/edge-nodes/me/config", &token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let expected_map = "map $host $kokoa_backend {\n    default \"\";\n    \
                        a.x.com 10.0.0.3:8081;\n    b.x.com 10.0.0.2:8080;\n}\n";
    assert_eq!(body["nginx_map"], expected_map);
    assert_eq!(body["hostnames"], json!(["a.x.com", "b.x.com"]));
    assert_eq!(
        body["routes"],
        json!([
            {"hostname": "a.x.com", "upstream": "10.0.0.3:8081"},
            {"hostname": "b.x.com", "upstream": "10.0.0.2:8080"},
        ])
    );
    assert_eq!(
        body["config_hash"],
        fingerprint(expected_map.as_bytes()).as_str()
    );
}

#[tokio::test]
async fn polling_is_idempotent_until_routes_change() {
    let app = build_router(state().await);
    let o1 = create_origin(&app, "o1", "10.0.0.2").await;
    create_route(&app, "a.x.com", &o1, 8080).await;
    let token = enrolled_token(&app).await;

    let uri = "/api/v1/edge-nodes/me/config";
    let (_, first) = send(&app, get_with_token(uri, &token)).await;
    let (_, second) = send(&app, get_with_token(uri, &token)).await;
    assert_eq!(first, second);

    create_route(&app, "b.x.com", &o1, 8081).await;
    let (_, third) = send(&app, get_with_token(uri, &token)).await;
    assert_ne!(first["config_hash"], third["config_hash"]);
}

#[tokio::test]
async fn empty_store_serves_header_only_map() {
    let app = build_router(state().await);
    let token = enrolled_token(&app).await;
    let (status, body) = send(
        &app,
        get_with_token("/api/v1/edge-nodes/me/config", &token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["nginx_map"],
        "map $host $kokoa_backend {\n    default \"\";\n}\n"
    );
    assert_eq!(body["hostnames"], json!([]));
}

#[tokio::test]
async fn poll_records_last_seen() {
    let state = state().await;
    let db = state.db.clone();
    let app = build_router(state);
    let token = enrolled_token(&app).await;

    let (status, _) = send(
        &app,
        get_with_token("/api/v1/edge-nodes/me/config", &token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let node = db.edge_node_by_token(&token).await.unwrap();
    let mut last_seen = node.last_seen;
    for _ in 0..50 {
        if last_seen.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        last_seen = db.edge_node_by_token(&token).await.unwrap().last_seen;
    }
    assert!(last_seen.is_some(), "last_seen never recorded");
}

// === Rate limiting ===

#[tokio::test]
async fn rate_limit_rejects_over_limit_per_address() {
    let limiter = Arc::new(RateLimiter::new(RateLimitConfig {
        max_requests: 2,
        window: Duration::from_secs(60),
        max_tracked: 100,
    }));
    let app = build_router(state_with(BOOTSTRAP, Some(limiter)).await);

    let from = |addr: &str| {
        let mut request = get("/healthz");
        let addr: SocketAddr = addr.parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    };

    assert_eq!(send(&app, from("192.0.2.1:5000")).await.0, StatusCode::OK);
    assert_eq!(send(&app, from("192.0.2.1:5001")).await.0, StatusCode::OK);
    let (status, body) = send(&app, from("192.0.2.1:5002")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "rate limit exceeded");

    assert_eq!(send(&app, from("192.0.2.2:5000")).await.0, StatusCode::OK);
}
