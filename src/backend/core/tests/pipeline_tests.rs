//! Sequencer and health prober behavior against a scripted transport.
//!
//! Tests cover:
//! - First success short-circuits the remaining candidates
//! - All failures report the first attempted failure
//! - Logical errors on 2xx fall through to the next candidate
//! - Empty candidate lists
//! - Termination within the sum of candidate budgets
//! - Health probing order and deadlines

mod common;

use common::{Script, ScriptedTransport};
use quantdash_core::capability::{BodyTemplate, Candidate, Capability, HttpMethod, RequestContext};
use quantdash_core::health::{HealthProber, HealthSignal};
use quantdash_core::relay::{CandidateSequencer, UpstreamCaller};
use quantdash_core::UpstreamError;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

const A: &str = "https://controller.example/v1/forecast/predict";
const B: &str = "https://fc.example/predict";
const C: &str = "https://fc-backup.example/predict";

fn sequencer(transport: &Arc<ScriptedTransport>) -> CandidateSequencer {
    CandidateSequencer::new(UpstreamCaller::new(transport.clone()))
}

fn capability(urls: &[&str]) -> Capability {
    urls.iter().fold(
        Capability::new("forecast").with_request_timeout(Duration::from_millis(100)),
        |cap, url| cap.with_candidate(Candidate::get(*url)),
    )
}

// ============================================================================
// Candidate Sequencer
// ============================================================================

#[tokio::test]
async fn test_first_success_stops_iteration() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .on(A, Script::Json(200, json!({"forecast": [1, 2, 3]})))
            .on(B, Script::Json(200, json!({"forecast": [4, 5, 6]}))),
    );

    let resolution = sequencer(&transport)
        .resolve_traced(&capability(&[A, B, C]), &RequestContext::new())
        .await;

    assert!(resolution.best.success);
    assert_eq!(resolution.best.candidate.unwrap().url, A);
    assert_eq!(resolution.tried.len(), 1);
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn test_falls_through_to_later_success() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .on(A, Script::Refuse)
            .on(B, Script::Text(503, "Service Unavailable".into()))
            .on(C, Script::Json(200, json!([10, 11, 12]))),
    );

    let best = sequencer(&transport)
        .resolve(&capability(&[A, B, C]), &RequestContext::new())
        .await;

    assert!(best.success);
    assert_eq!(best.candidate.unwrap().url, C);
    assert_eq!(transport.urls(), vec![A, B, C]);
}

#[tokio::test]
async fn test_all_failures_report_first() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .on(A, Script::Json(500, json!({"detail": "model unavailable"})))
            .on(B, Script::Refuse)
            .on(C, Script::Hang),
    );

    let resolution = sequencer(&transport)
        .resolve_traced(&capability(&[A, B, C]), &RequestContext::new())
        .await;

    let best = resolution.best;
    assert!(!best.success);
    assert_eq!(best.status, 500);
    assert_eq!(best.candidate.unwrap().url, A);
    assert_eq!(
        best.error,
        Some(UpstreamError::Logical("model unavailable".into()))
    );
    assert_eq!(resolution.tried.len(), 3);
    assert_eq!(transport.call_count(), 3);
}

#[tokio::test]
async fn test_first_failure_may_be_a_timeout() {
    let transport = Arc::new(ScriptedTransport::new().on(A, Script::Hang).on(B, Script::Refuse));

    let best = sequencer(&transport)
        .resolve(&capability(&[A, B]), &RequestContext::new())
        .await;

    assert_eq!(best.error, Some(UpstreamError::Timeout { budget_ms: 100 }));
    assert_eq!(best.status, 0);
    assert_eq!(best.latency_ms, None);
}

#[tokio::test]
async fn test_logical_error_on_2xx_falls_through() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .on(A, Script::Json(200, json!({"error": "warming up"})))
            .on(B, Script::Json(200, json!({"data": {"values": [1, 2]}}))),
    );

    let best = sequencer(&transport)
        .resolve(&capability(&[A, B]), &RequestContext::new())
        .await;

    assert!(best.success);
    assert_eq!(best.candidate.unwrap().url, B);
    assert_eq!(best.payload, json!({"values": [1, 2]}));
}

#[tokio::test]
async fn test_empty_candidates() {
    let transport = Arc::new(ScriptedTransport::new());

    let resolution = sequencer(&transport)
        .resolve_traced(&Capability::new("ghost"), &RequestContext::new())
        .await;

    assert!(!resolution.best.success);
    assert_eq!(resolution.best.error, Some(UpstreamError::NoCandidates));
    assert!(resolution.best.candidate.is_none());
    assert!(resolution.tried.is_empty());
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn test_terminates_within_sum_of_budgets() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .on(A, Script::Hang)
            .on(B, Script::Hang)
            .on(C, Script::Hang),
    );
    let capability = Capability::new("slow")
        .with_candidate(Candidate::get(A).with_timeout(Duration::from_millis(50)))
        .with_candidate(Candidate::get(B).with_timeout(Duration::from_millis(50)))
        .with_candidate(Candidate::get(C).with_timeout(Duration::from_millis(50)));

    let started = Instant::now();
    let best = sequencer(&transport)
        .resolve(&capability, &RequestContext::new())
        .await;
    let elapsed = started.elapsed();

    assert!(!best.success);
    assert!(elapsed >= Duration::from_millis(150));
    assert!(elapsed < Duration::from_millis(1000), "took {:?}", elapsed);
}

#[tokio::test]
async fn test_series_seed_is_shared_between_candidates() {
    let transport = Arc::new(ScriptedTransport::new());
    let capability = Capability::new("forecast")
        .with_candidate(Candidate::post(A).with_body(BodyTemplate::series("values", 12)))
        .with_candidate(Candidate::post(B).with_body(BodyTemplate::series("values", 12)));

    sequencer(&transport)
        .resolve(&capability, &RequestContext::new())
        .await;

    let calls = transport.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c.method == HttpMethod::Post));
    let first = calls[0].body.clone().unwrap();
    assert_eq!(first["values"].as_array().unwrap().len(), 12);
    assert_eq!(calls[1].body, Some(first));
}

// ============================================================================
// Health Prober
// ============================================================================

fn probed(targets: &[&str]) -> Capability {
    targets.iter().fold(
        Capability::new("forecast").with_health_timeout(Duration::from_millis(100)),
        |cap, url| cap.with_health_target(*url),
    )
}

#[tokio::test]
async fn test_health_stops_at_first_ok() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .on("https://controller.example/health", Script::Text(404, "Not Found".into()))
            .on("https://controller.example/healthz", Script::Json(200, json!({"ok": true})))
            .on("https://fc.example/health", Script::Json(200, json!({"ok": true}))),
    );

    let signal = HealthProber::new(transport.clone())
        .probe(&probed(&[
            "https://controller.example/health",
            "https://controller.example/healthz",
            "https://fc.example/health",
        ]))
        .await;

    assert_eq!(signal, HealthSignal::UP);
    assert_eq!(
        transport.urls(),
        vec!["https://controller.example/health", "https://controller.example/healthz"]
    );
}

#[tokio::test]
async fn test_health_down_when_every_target_fails() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .on("https://controller.example/health", Script::Hang)
            .on("https://fc.example/health", Script::Text(500, "boom".into())),
    );

    let started = Instant::now();
    let signal = HealthProber::new(transport.clone())
        .probe(&probed(&["https://controller.example/health", "https://fc.example/health"]))
        .await;

    assert_eq!(signal, HealthSignal::DOWN);
    assert_eq!(transport.call_count(), 2);
    assert!(started.elapsed() < Duration::from_millis(1000));
}

#[tokio::test]
async fn test_health_without_targets_is_down() {
    let transport = Arc::new(ScriptedTransport::new());
    let signal = HealthProber::new(transport.clone()).probe(&probed(&[])).await;

    assert!(!signal.is_up());
    assert_eq!(transport.call_count(), 0);
}
