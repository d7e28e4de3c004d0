//! HTTP surface of the relay.
//!
//! | route                    | handler                 |
//! |--------------------------|-------------------------|
//! | `GET /health`            | relay liveness          |
//! | `GET /metrics`           | Prometheus exposition   |
//! | `GET /api/capabilities`  | configured capabilities |
//! | `GET /api/{capability}`  | run with query inputs   |
//! | `POST /api/{capability}` | run with a JSON body    |
//!
//! Capability routes answer 200 with a [`ResponseEnvelope`] whatever the
//! upstream outcome; only an unknown name yields an error body (404).
//!
//! [`ResponseEnvelope`]: crate::envelope::ResponseEnvelope

mod handlers;

use axum::{routing::get, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::health;
use crate::relay::Relay;

pub use handlers::{CandidateSummary, CapabilitySummary};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(relay: Arc<Relay>) -> Self {
        Self {
            relay,
            started_at: Instant::now(),
        }
    }
}

/// Build the API router.
///
/// # Example
///
/// ```rust,ignore
/// let relay = Relay::from_config(&config)?;
/// let app = build_router(AppState::new(Arc::new(relay)));
/// ```
pub fn build_router(state: AppState) -> Router {
    // the dashboard UI is served from another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::liveness_check))
        .route("/metrics", get(handlers::prometheus_metrics))
        .route("/api/capabilities", get(handlers::list_capabilities))
        .route(
            "/api/:capability",
            get(handlers::fetch_capability).post(handlers::submit_capability),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

/// Standard API response wrapper for non-envelope routes.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
        }
    }
}
