//! HTTP client for communicating with the QuantDash relay.

use anyhow::{Context, Result};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// Error body returned by the relay for caller mistakes.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// API response wrapper matching the relay's non-envelope routes.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ErrorBody>,
}

/// HTTP client for the relay API.
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client pointing at the given base URL.
    ///
    /// The timeout leaves room for a capability that walks every candidate.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Return the configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET a wrapped route and unwrap its `data`.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;

        let status = resp.status();
        let api_resp: ApiResponse<T> = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {} ({})", url, status))?;

        if api_resp.success {
            api_resp
                .data
                .ok_or_else(|| anyhow::anyhow!("API returned success but no data"))
        } else {
            Err(describe(status, api_resp.error))
        }
    }

    /// Perform a raw GET request and return the full JSON value.
    pub async fn get_raw(&self, path: &str) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        resp.json()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))
    }

    /// Run a capability route and return the envelope.
    pub async fn run_capability(
        &self,
        name: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let url = format!("{}/api/{}", self.base_url, name);
        let method = if body.is_some() { Method::POST } else { Method::GET };

        let mut request = self.client.request(method.clone(), &url).query(query);
        if let Some(body) = body {
            request = request.json(body);
        }
        let resp = request
            .send()
            .await
            .with_context(|| format!("{} {} failed", method, url))?;

        let status = resp.status();
        let value: Value = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {} ({})", url, status))?;

        if status.is_success() {
            return Ok(value);
        }
        let error = value
            .get("error")
            .cloned()
            .and_then(|e| serde_json::from_value::<ErrorBody>(e).ok());
        Err(describe(status, error))
    }
}

fn describe(status: StatusCode, error: Option<ErrorBody>) -> anyhow::Error {
    match error {
        Some(e) => anyhow::anyhow!("API error ({}): [{}] {}", status, e.code, e.message),
        None => anyhow::anyhow!("API error ({}): Unknown error", status),
    }
}
