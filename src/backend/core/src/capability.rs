//! Capabilities and their fallback candidates.
//!
//! A [`Capability`] is a named data-fetching intent ("forecast", "montecarlo")
//! with an ordered list of [`Candidate`] endpoints and a list of health probe
//! URLs. Capabilities are built once from configuration and never mutated;
//! per-request inputs live in a [`RequestContext`] and are substituted into
//! candidate templates by [`Capability::plan`].
//!
//! # Example
//!
//! ```rust,ignore
//! use quantdash_core::capability::{BodyTemplate, Candidate, Capability};
//!
//! let forecast = Capability::new("forecast")
//!     .with_candidate(
//!         Candidate::post("https://controller/v1/forecast/predict")
//!             .with_body(BodyTemplate::series("values", 12)),
//!     )
//!     .with_candidate(
//!         Candidate::post("https://direct/predict")
//!             .with_body(BodyTemplate::series("values", 12)),
//!     )
//!     .with_health_target("https://direct/health");
//! ```

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;

use crate::relay::transport::UpstreamRequest;
use crate::series;

/// Default budget for one candidate attempt.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(6000);

/// Default budget for one health probe.
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_millis(1500);

// ═══════════════════════════════════════════════════════════════════════════════
// HTTP Method
// ═══════════════════════════════════════════════════════════════════════════════

/// HTTP methods a candidate may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Body Templates
// ═══════════════════════════════════════════════════════════════════════════════

/// How a candidate's request body is derived from the caller's input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BodyTemplate {
    /// No body.
    #[default]
    None,

    /// Forward the caller's JSON body, or `{}` when absent.
    Passthrough,

    /// `{ <field>: [exactly `length` numbers] }`.
    ///
    /// Caller-supplied values are truncated or padded to `length`; when the
    /// caller sent none, a seed random walk is synthesized.
    Series { field: String, length: usize },
}

impl BodyTemplate {
    /// Fixed-length numeric body under `field`.
    pub fn series(field: impl Into<String>, length: usize) -> Self {
        Self::Series {
            field: field.into(),
            length,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Candidate
// ═══════════════════════════════════════════════════════════════════════════════

/// One concrete way to satisfy a capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    /// Absolute URL, without query string
    pub url: String,

    /// HTTP method
    pub method: HttpMethod,

    /// Body template (ignored for GET)
    pub body: BodyTemplate,

    /// Per-candidate budget, overriding the capability default
    #[serde(skip_serializing_if = "Option::is_none", with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

impl Candidate {
    /// Create a candidate.
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            body: BodyTemplate::None,
            timeout: None,
        }
    }

    /// GET candidate.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    /// POST candidate forwarding the caller's body.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url).with_body(BodyTemplate::Passthrough)
    }

    /// Set the body template.
    pub fn with_body(mut self, body: BodyTemplate) -> Self {
        self.body = body;
        self
    }

    /// Set a per-candidate timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Substitute the request context into this template.
    ///
    /// GET candidates carry the caller's query string; POST candidates carry
    /// the rendered body. `seed` is shared across the candidates of one
    /// request so every fallback sends the same synthesized series.
    pub fn materialize(&self, ctx: &RequestContext, seed: &mut Option<Vec<f64>>) -> UpstreamRequest {
        match self.method {
            HttpMethod::Get => UpstreamRequest {
                method: HttpMethod::Get,
                url: append_query(&self.url, &ctx.query),
                body: None,
            },
            HttpMethod::Post => UpstreamRequest {
                method: HttpMethod::Post,
                url: self.url.clone(),
                body: self.render_body(ctx, seed),
            },
        }
    }

    fn render_body(&self, ctx: &RequestContext, seed: &mut Option<Vec<f64>>) -> Option<Value> {
        match &self.body {
            BodyTemplate::None => None,
            BodyTemplate::Passthrough => Some(ctx.body.clone().unwrap_or_else(|| json!({}))),
            BodyTemplate::Series { field, length } => {
                let supplied = ctx.supplied_values(field);
                let values = if supplied.is_empty() {
                    match seed {
                        Some(existing) if existing.len() == *length => existing.clone(),
                        _ => {
                            let generated = seed_series(*length);
                            *seed = Some(generated.clone());
                            generated
                        }
                    }
                } else {
                    fit_length(&supplied, *length)
                };
                let mut body = serde_json::Map::new();
                body.insert(field.clone(), json!(values));
                Some(Value::Object(body))
            }
        }
    }
}

fn append_query(url: &str, query: &[(String, String)]) -> String {
    if query.is_empty() {
        return url.to_string();
    }
    match reqwest::Url::parse(url) {
        Ok(mut parsed) => {
            parsed
                .query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
            parsed.to_string()
        }
        // validated at startup; keep the template untouched if it slipped through
        Err(_) => url.to_string(),
    }
}

/// Truncate or pad `values` to exactly `length` entries.
///
/// Padding repeats the last supplied value. An empty input yields an empty
/// output; callers synthesize a seed instead.
pub fn fit_length(values: &[f64], length: usize) -> Vec<f64> {
    let Some(&last) = values.last() else {
        return Vec::new();
    };
    let mut fitted: Vec<f64> = values.iter().copied().take(length).collect();
    fitted.resize(length, last);
    fitted
}

/// Seed random walk: starts at 100 and drifts by `(r - 0.5) * 2 + 0.1` per
/// step, rounded to two decimals.
pub fn seed_series(length: usize) -> Vec<f64> {
    let mut rng = rand::thread_rng();
    let mut x = 100.0_f64;
    (0..length)
        .map(|_| {
            x += (rng.gen::<f64>() - 0.5) * 2.0 + 0.1;
            (x * 100.0).round() / 100.0
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Capability
// ═══════════════════════════════════════════════════════════════════════════════

/// A named demand with its ordered fallback candidates.
#[derive(Debug, Clone, Serialize)]
pub struct Capability {
    /// Capability name (path segment under `/api/`)
    pub name: String,

    /// Candidates in preference order
    pub candidates: Vec<Candidate>,

    /// Health probe URLs in probe order
    pub health_targets: Vec<String>,

    /// Default budget per candidate
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Budget per health probe
    #[serde(with = "humantime_serde")]
    pub health_timeout: Duration,

    /// Fixed payload served without calling upstream
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<Value>,
}

impl Capability {
    /// Create a capability with no candidates and default budgets.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            candidates: Vec::new(),
            health_targets: Vec::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
            preset: None,
        }
    }

    pub fn with_candidate(mut self, candidate: Candidate) -> Self {
        self.candidates.push(candidate);
        self
    }

    pub fn with_health_target(mut self, url: impl Into<String>) -> Self {
        self.health_targets.push(url.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    /// Serve a fixed payload instead of calling upstream.
    pub fn with_preset(mut self, payload: Value) -> Self {
        self.preset = Some(payload);
        self
    }

    /// Whether this capability answers from a preset payload.
    pub fn is_static(&self) -> bool {
        self.preset.is_some()
    }

    /// Effective budget for a candidate.
    pub fn timeout_for(&self, candidate: &Candidate) -> Duration {
        candidate.timeout.unwrap_or(self.request_timeout)
    }

    /// Materialize every candidate for one request, in preference order.
    pub fn plan(&self, ctx: &RequestContext) -> Vec<(UpstreamRequest, Duration)> {
        let mut seed = None;
        self.candidates
            .iter()
            .map(|candidate| {
                (
                    candidate.materialize(ctx, &mut seed),
                    self.timeout_for(candidate),
                )
            })
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Request Context
// ═══════════════════════════════════════════════════════════════════════════════

/// Opaque substitution inputs taken from the inbound request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    /// Query parameters, in arrival order
    pub query: Vec<(String, String)>,

    /// JSON body, when one was sent
    pub body: Option<Value>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Numeric values the caller sent under `field`, non-numeric entries dropped.
    pub fn supplied_values(&self, field: &str) -> Vec<f64> {
        self.body
            .as_ref()
            .and_then(|body| body.get(field))
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(series::as_number).collect())
            .unwrap_or_default()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
