//! HTTP transport seam.
//!
//! The [`Transport`] trait is the only place the relay touches the network.
//! Production code uses [`HttpTransport`] (reqwest); tests substitute counting
//! or scripted transports.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::capability::HttpMethod;
use crate::error::UpstreamError;

/// A fully materialized outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRequest {
    pub method: HttpMethod,
    pub url: String,
    pub body: Option<Value>,
}

impl UpstreamRequest {
    /// Bodiless GET, as sent by health probes.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            body: None,
        }
    }
}

/// Best-effort decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// Body parsed as JSON
    Json(Value),
    /// Body was not JSON but is valid UTF-8
    Text(String),
    /// Body could not be read
    Unreadable(String),
}

impl ResponseBody {
    /// Decode raw bytes: JSON first, then UTF-8 text.
    pub fn decode(bytes: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(value) => Self::Json(value),
            Err(_) => match std::str::from_utf8(bytes) {
                Ok(text) => Self::Text(text.to_string()),
                Err(e) => Self::Unreadable(format!("body is neither JSON nor UTF-8 text: {}", e)),
            },
        }
    }
}

/// Raw outcome of one HTTP exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: ResponseBody,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }
}

/// Performs one HTTP exchange.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request and read the body.
    ///
    /// Errors are transport-level only (connect, DNS, reset). Any HTTP status,
    /// including 5xx, is a successful exchange.
    async fn send(&self, request: &UpstreamRequest) -> Result<UpstreamResponse, UpstreamError>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// reqwest Transport
// ═══════════════════════════════════════════════════════════════════════════════

/// Transport backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with a pooled client.
    ///
    /// The client carries only a connect timeout; per-attempt deadlines are
    /// enforced by the timeout guard.
    pub fn new() -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("quantdash-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(UpstreamError::from)?;
        Ok(Self { client })
    }

    /// Use a custom HTTP client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &UpstreamRequest) -> Result<UpstreamResponse, UpstreamError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };

        let mut builder = self
            .client
            .request(method, &request.url)
            .header(ACCEPT, "application/json");
        if let Some(body) = &request.body {
            builder = builder.header(CONTENT_TYPE, "application/json").json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = match response.bytes().await {
            Ok(bytes) => ResponseBody::decode(&bytes),
            Err(e) => ResponseBody::Unreadable(e.to_string()),
        };

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}
