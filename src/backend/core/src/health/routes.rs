//! Liveness route for the relay itself.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::api::AppState;

/// Body of `GET /health`.
#[derive(Debug, Serialize, Deserialize)]
pub struct LivenessResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub capabilities: usize,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// GET /health - the relay process is up.
///
/// Upstream backends are not consulted; their liveness is reported per
/// capability in each envelope.
pub async fn liveness_check(State(state): State<AppState>) -> impl IntoResponse {
    let response = LivenessResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        capabilities: state.relay.registry().len(),
        timestamp: chrono::Utc::now(),
    };
    (StatusCode::OK, Json(response))
}
