//! Request handlers.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::{ApiResponse, AppState};
use crate::capability::{Capability, HttpMethod, RequestContext};
use crate::envelope::ResponseEnvelope;
use crate::error::Result;
use crate::telemetry::MetricsRegistry;

type QueryPairs = Query<Vec<(String, String)>>;

// ═══════════════════════════════════════════════════════════════════════════════
// Capability Routes
// ═══════════════════════════════════════════════════════════════════════════════

/// GET /api/:capability
pub async fn fetch_capability(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): QueryPairs,
) -> Result<Json<ResponseEnvelope>> {
    let ctx = RequestContext {
        query,
        body: None,
    };
    let envelope = state.relay.run(&name, &ctx).await?;
    Ok(Json(envelope))
}

/// POST /api/:capability
///
/// The body is optional and opaque. Anything that is not JSON is dropped
/// with a warning and the capability runs as if no body had been sent.
pub async fn submit_capability(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): QueryPairs,
    body: Bytes,
) -> Result<Json<ResponseEnvelope>> {
    let ctx = RequestContext {
        query,
        body: parse_body(&name, &body),
    };
    let envelope = state.relay.run(&name, &ctx).await?;
    Ok(Json(envelope))
}

fn parse_body(capability: &str, body: &[u8]) -> Option<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Null) => None,
        Ok(value) => Some(value),
        Err(e) => {
            warn!(capability = %capability, error = %e, "Ignoring non-JSON request body");
            None
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Capability Listing
// ═══════════════════════════════════════════════════════════════════════════════

/// One candidate as listed by `/api/capabilities`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSummary {
    pub method: HttpMethod,
    pub url: String,
    pub timeout_ms: u64,
}

/// One capability as listed by `/api/capabilities`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilitySummary {
    pub name: String,
    /// `upstream` or `static`
    pub kind: String,
    pub candidates: Vec<CandidateSummary>,
    pub health_targets: Vec<String>,
}

impl From<&Capability> for CapabilitySummary {
    fn from(capability: &Capability) -> Self {
        Self {
            name: capability.name.clone(),
            kind: if capability.is_static() { "static" } else { "upstream" }.to_string(),
            candidates: capability
                .candidates
                .iter()
                .map(|c| CandidateSummary {
                    method: c.method,
                    url: c.url.clone(),
                    timeout_ms: capability.timeout_for(c).as_millis() as u64,
                })
                .collect(),
            health_targets: capability.health_targets.clone(),
        }
    }
}

/// GET /api/capabilities
pub async fn list_capabilities(State(state): State<AppState>) -> impl IntoResponse {
    let summaries: Vec<CapabilitySummary> = state
        .relay
        .registry()
        .iter()
        .map(CapabilitySummary::from)
        .collect();
    Json(ApiResponse::success(summaries))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Metrics
// ═══════════════════════════════════════════════════════════════════════════════

/// GET /metrics
pub async fn prometheus_metrics() -> impl IntoResponse {
    let body = MetricsRegistry::global().render();
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body("x", b""), None);
        assert_eq!(parse_body("x", b"  \n"), None);
        assert_eq!(parse_body("x", b"null"), None);
        assert_eq!(parse_body("x", b"not json"), None);
        assert_eq!(
            parse_body("x", br#"{"values":[1,2]}"#),
            Some(json!({"values": [1, 2]}))
        );
    }
}
