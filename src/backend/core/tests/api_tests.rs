//! HTTP route tests.
//!
//! Tests cover:
//! - Liveness endpoint
//! - Capability listing
//! - GET and POST capability routes, query and body forwarding
//! - Unknown capability error body
//! - Metrics endpoint without an installed recorder

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{Script, ScriptedTransport};
use quantdash_core::api::{build_router, AppState};
use quantdash_core::capability::{BodyTemplate, Candidate, Capability};
use quantdash_core::relay::{CapabilityRegistry, Relay, RelaySettings};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const PREDICT: &str = "https://fc.example/predict";
const SIMULATE: &str = "https://mc.example/simulate";
const HEALTH: &str = "https://fc.example/health";

fn transport() -> Arc<ScriptedTransport> {
    Arc::new(
        ScriptedTransport::new()
            .on(PREDICT, Script::Json(200, json!({"forecast": [1, 2, 3, 4]})))
            .on(
                &format!("{}?paths=250", SIMULATE),
                Script::Json(200, json!({"paths": [[1, 2], [3, 4]]})),
            )
            .on(HEALTH, Script::Json(200, json!({"status": "ok"}))),
    )
}

fn app(transport: Arc<ScriptedTransport>) -> Router {
    let registry = CapabilityRegistry::new()
        .with_capability(
            Capability::new("forecast")
                .with_request_timeout(Duration::from_millis(200))
                .with_candidate(Candidate::post(PREDICT).with_body(BodyTemplate::series("values", 4)))
                .with_health_target(HEALTH),
        )
        .with_capability(
            Capability::new("montecarlo")
                .with_request_timeout(Duration::from_millis(200))
                .with_candidate(Candidate::get(SIMULATE))
                .with_health_target(HEALTH),
        )
        .with_capability(Capability::new("sentiment").with_preset(json!({"sentimentScore": 0.42})));

    let relay = Relay::new(registry, transport, RelaySettings::default());
    build_router(AppState::new(Arc::new(relay)))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

// ============================================================================
// Service Routes
// ============================================================================

#[tokio::test]
async fn test_liveness() {
    let (status, body) = send(app(transport()), get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["capabilities"], 3);
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_list_capabilities() {
    let (status, body) = send(app(transport()), get("/api/capabilities")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let list = body["data"].as_array().unwrap();
    assert_eq!(list.len(), 3);
    assert_eq!(list[0]["name"], "forecast");
    assert_eq!(list[0]["kind"], "upstream");
    assert_eq!(list[0]["candidates"][0]["method"], "POST");
    assert_eq!(list[0]["candidates"][0]["timeout_ms"], 200);
    assert_eq!(list[2]["name"], "sentiment");
    assert_eq!(list[2]["kind"], "static");
}

#[tokio::test]
async fn test_metrics_route() {
    let app = app(transport());
    let response = app.oneshot(get("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

// ============================================================================
// Capability Routes
// ============================================================================

#[tokio::test]
async fn test_post_capability_forwards_body() {
    let transport = transport();
    let request = Request::builder()
        .method("POST")
        .uri("/api/forecast")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"values": [9, 8, 7, 6, 5]}"#))
        .unwrap();

    let (status, body) = send(app(transport.clone()), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "online");
    assert_eq!(body["endpoint_url"], PREDICT);
    assert_eq!(body["chartData"].as_array().unwrap().len(), 4);
    assert!(body["lastUpdated"].is_string());

    let sent = transport
        .calls()
        .into_iter()
        .find(|c| c.url == PREDICT)
        .unwrap();
    assert_eq!(sent.body, Some(json!({"values": [9.0, 8.0, 7.0, 6.0]})));
}

#[tokio::test]
async fn test_post_with_garbage_body_still_runs() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/forecast")
        .body(Body::from("values=1,2,3"))
        .unwrap();

    let (status, body) = send(app(transport()), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "online");
}

#[tokio::test]
async fn test_get_capability_forwards_query() {
    let (status, body) = send(app(transport()), get("/api/montecarlo?paths=250")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "online");
    assert_eq!(body["chartData"], json!([{"x": 0, "y": 1.0}, {"x": 1, "y": 2.0}]));
}

#[tokio::test]
async fn test_upstream_failure_is_still_200() {
    // query string does not match the script, so the upstream refuses
    let (status, body) = send(app(transport()), get("/api/montecarlo?paths=1")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["endpoint_status"], 0);
    assert!(body["data"]["error"].is_string());
    assert_eq!(body["chartData"], json!([]));
}

#[tokio::test]
async fn test_static_capability_route() {
    let (status, body) = send(app(transport()), get("/api/sentiment")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "online");
    assert_eq!(body["data"]["sentimentScore"], 0.42);
    assert!(body["endpoint_url"].is_null());
}

#[tokio::test]
async fn test_unknown_capability_is_404() {
    let (status, body) = send(app(transport()), get("/api/nope")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "CAPABILITY_NOT_FOUND");
    assert!(body["error"]["message"].as_str().unwrap().contains("nope"));
    assert!(body["error"]["timestamp"].is_string());
}
