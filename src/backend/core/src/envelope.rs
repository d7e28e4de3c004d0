//! Status fusion and the response envelope handed to the UI.
//!
//! # Status Semantics
//!
//! | health | data call | status     |
//! |--------|-----------|------------|
//! | up     | success   | `online`   |
//! | up     | failure   | `degraded` |
//! | down   | either    | `offline`  |
//!
//! An unreachable health endpoint takes precedence over the data call: the
//! backend as a whole is considered gone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

use crate::health::HealthSignal;
use crate::relay::caller::{logical_error, AttemptResult};
use crate::series::{self, ChartPoint};

// ═══════════════════════════════════════════════════════════════════════════════
// Reported Status
// ═══════════════════════════════════════════════════════════════════════════════

/// Tri-state status shown on a model card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportedStatus {
    Online,
    Degraded,
    Offline,
}

impl ReportedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Degraded => "degraded",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for ReportedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Combine the data call outcome with the health signal.
pub fn fuse(success: bool, health: HealthSignal) -> ReportedStatus {
    match (health.is_up(), success) {
        (true, true) => ReportedStatus::Online,
        (true, false) => ReportedStatus::Degraded,
        (false, _) => ReportedStatus::Offline,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Response Envelope
// ═══════════════════════════════════════════════════════════════════════════════

/// The normalized unit returned for every capability request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub status: ReportedStatus,

    /// HTTP status of the reported attempt (0 for transport failures)
    pub endpoint_status: Option<u16>,

    /// URL of the reported attempt
    pub endpoint_url: Option<String>,

    pub latency_ms: Option<u64>,

    /// Assembly time, never an upstream timestamp
    #[serde(rename = "lastUpdated")]
    pub last_updated: DateTime<Utc>,

    /// Normalized payload or `{ "error": ... }`
    pub data: Value,

    /// Empty unless the reported attempt succeeded
    #[serde(rename = "chartData")]
    pub chart_data: Vec<ChartPoint>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<Value>,
}

impl ResponseEnvelope {
    /// Attach a debug block.
    pub fn with_debug(mut self, debug: Value) -> Self {
        self.debug = Some(debug);
        self
    }

    /// Envelope for a capability served from a fixed payload.
    pub fn preset(payload: &Value, chart_cap: usize) -> Self {
        Self {
            status: ReportedStatus::Online,
            endpoint_status: None,
            endpoint_url: None,
            latency_ms: None,
            last_updated: Utc::now(),
            data: payload.clone(),
            chart_data: series::to_chart(payload, chart_cap),
            debug: None,
        }
    }
}

/// Longest upstream text quoted in `data.error`.
const MAX_QUOTED_TEXT: usize = 200;

/// `data` for the envelope.
///
/// A successful payload passes through. A failed attempt always yields
/// `{ "error": <message> }`: the `detail`/`error` the payload names, else the
/// attempt's diagnostic with any plain-text body appended.
fn normalize_data(best: &AttemptResult) -> Value {
    if best.success {
        if best.payload.is_null() {
            return json!({ "error": "No payload" });
        }
        return best.payload.clone();
    }
    json!({ "error": failure_message(best) })
}

fn failure_message(best: &AttemptResult) -> String {
    if let Some(message) = logical_error(&best.payload) {
        return message;
    }
    let diagnostic = best
        .error
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "Upstream request failed".to_string());
    match best.payload.as_str().map(str::trim) {
        Some(text) if !text.is_empty() => {
            let quoted: String = text.chars().take(MAX_QUOTED_TEXT).collect();
            format!("{}: {}", diagnostic, quoted)
        }
        _ => diagnostic,
    }
}

/// Build the envelope for one request.
pub fn assemble(best: &AttemptResult, health: HealthSignal, chart_cap: usize) -> ResponseEnvelope {
    let data = normalize_data(best);
    let chart_data = if best.success {
        series::to_chart(&data, chart_cap)
    } else {
        Vec::new()
    };

    ResponseEnvelope {
        status: fuse(best.success, health),
        endpoint_status: best.candidate.as_ref().map(|_| best.status),
        endpoint_url: best.candidate.as_ref().map(|c| c.url.clone()),
        latency_ms: best.latency_ms,
        last_updated: Utc::now(),
        data,
        chart_data,
        debug: None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
