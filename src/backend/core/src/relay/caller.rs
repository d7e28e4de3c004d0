//! Single upstream attempt.
//!
//! [`UpstreamCaller::call`] never fails: every transport, timeout and decode
//! problem is folded into a failed [`AttemptResult`] so the sequencer can
//! always move on to the next candidate.

use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::timeout::race;
use super::transport::{ResponseBody, Transport, UpstreamRequest};
use crate::capability::HttpMethod;
use crate::error::UpstreamError;

/// Which candidate produced an attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateRef {
    pub url: String,
    pub method: HttpMethod,
}

impl From<&UpstreamRequest> for CandidateRef {
    fn from(request: &UpstreamRequest) -> Self {
        Self {
            url: request.url.clone(),
            method: request.method,
        }
    }
}

/// Outcome of invoking one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptResult {
    /// 2xx, decodable, non-null payload that does not encode an error
    pub success: bool,

    /// HTTP status, 0 when the call itself failed
    pub status: u16,

    /// Round trip in milliseconds, `None` if the call never completed
    pub latency_ms: Option<u64>,

    /// Decoded payload (JSON or raw text); `Null` when nothing was decoded
    pub payload: Value,

    /// Originating candidate, `None` for synthetic results
    pub candidate: Option<CandidateRef>,

    /// Response headers, for debug output only
    pub headers: BTreeMap<String, String>,

    /// Why the attempt failed
    pub error: Option<UpstreamError>,
}

impl AttemptResult {
    /// A failed attempt that never produced an HTTP response.
    pub fn failed(candidate: Option<CandidateRef>, error: UpstreamError) -> Self {
        Self {
            success: false,
            status: 0,
            latency_ms: None,
            payload: json!({ "error": error.to_string() }),
            candidate,
            headers: BTreeMap::new(),
            error: Some(error),
        }
    }

    /// Synthetic result for a capability with nothing to call.
    pub fn no_candidates() -> Self {
        Self::failed(None, UpstreamError::NoCandidates)
    }
}

/// Unwrap the conventional `{ "data": ... }` envelope upstream services use.
pub fn unwrap_payload(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Application-level failure reported inside a payload.
///
/// An object carrying a `detail` or `error` field that is a non-empty string,
/// `true`, an array or an object counts; `null`, `false` and numeric fields
/// (e.g. an error metric) do not. `detail` wins over `error`.
pub fn logical_error(payload: &Value) -> Option<String> {
    let map = payload.as_object()?;
    ["detail", "error"].iter().find_map(|key| match map.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Bool(true) => Some(format!("{} flag set", key)),
        v @ (Value::Array(_) | Value::Object(_)) => Some(v.to_string()),
        _ => None,
    })
}

/// Performs one upstream attempt under a deadline.
#[derive(Clone)]
pub struct UpstreamCaller {
    transport: Arc<dyn Transport>,
}

impl UpstreamCaller {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Invoke `request`, bounded by `deadline`.
    pub async fn call(&self, request: &UpstreamRequest, deadline: Duration) -> AttemptResult {
        let candidate = CandidateRef::from(request);
        let started = Instant::now();

        let response = match race(self.transport.send(request), deadline).await {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => {
                warn!(url = %request.url, method = %request.method, error = %error, "Upstream call failed");
                return AttemptResult::failed(Some(candidate), error);
            }
            Err(timeout) => {
                warn!(url = %request.url, method = %request.method, budget_ms = timeout.budget_ms(), "Upstream call timed out");
                return AttemptResult::failed(
                    Some(candidate),
                    UpstreamError::Timeout {
                        budget_ms: timeout.budget_ms(),
                    },
                );
            }
        };
        let latency_ms = started.elapsed().as_millis() as u64;
        let http_ok = response.is_success();

        let (payload, decode_error) = match response.body {
            ResponseBody::Json(value) => {
                let envelope_error = logical_error(&value);
                let payload = unwrap_payload(value);
                let error = envelope_error.or_else(|| logical_error(&payload));
                (payload, error.map(UpstreamError::Logical))
            }
            ResponseBody::Text(text) => (Value::String(text), None),
            ResponseBody::Unreadable(reason) => (Value::Null, Some(UpstreamError::Decode(reason))),
        };

        let error = if !http_ok {
            Some(decode_error.unwrap_or(UpstreamError::HttpStatus(response.status)))
        } else if let Some(error) = decode_error {
            Some(error)
        } else if payload.is_null() {
            Some(UpstreamError::Decode("empty payload".to_string()))
        } else {
            None
        };

        debug!(
            url = %request.url,
            method = %request.method,
            status = response.status,
            latency_ms = latency_ms,
            success = error.is_none(),
            "Upstream attempt completed"
        );

        AttemptResult {
            success: error.is_none(),
            status: response.status,
            latency_ms: Some(latency_ms),
            payload,
            candidate: Some(candidate),
            headers: response.headers,
            error,
        }
    }
}
