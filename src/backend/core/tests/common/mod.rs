//! Shared test transport.

#![allow(dead_code)]

use async_trait::async_trait;
use quantdash_core::relay::{ResponseBody, Transport, UpstreamRequest, UpstreamResponse};
use quantdash_core::UpstreamError;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

/// What the transport does for a URL.
#[derive(Debug, Clone)]
pub enum Script {
    /// Answer with status and JSON body
    Json(u16, Value),
    /// Answer with status and a plain text body
    Text(u16, String),
    /// Fail at the transport level
    Refuse,
    /// Never answer within any reasonable budget
    Hang,
}

/// Transport answering from a per-URL script and recording every request.
///
/// URLs without a script are refused.
#[derive(Default)]
pub struct ScriptedTransport {
    script: HashMap<String, Script>,
    calls: Mutex<Vec<UpstreamRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, url: &str, script: Script) -> Self {
        self.script.insert(url.to_string(), script);
        self
    }

    pub fn calls(&self) -> Vec<UpstreamRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.calls().into_iter().map(|r| r.url).collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &UpstreamRequest) -> Result<UpstreamResponse, UpstreamError> {
        self.calls.lock().unwrap().push(request.clone());

        let reply = |status: u16, body: ResponseBody| UpstreamResponse {
            status,
            headers: BTreeMap::from([("content-type".to_string(), "application/json".to_string())]),
            body,
        };

        match self.script.get(&request.url).cloned() {
            Some(Script::Json(status, value)) => Ok(reply(status, ResponseBody::Json(value))),
            Some(Script::Text(status, text)) => Ok(reply(status, ResponseBody::Text(text))),
            Some(Script::Hang) => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Err(UpstreamError::Transport("hung".into()))
            }
            Some(Script::Refuse) | None => {
                Err(UpstreamError::Transport("connection refused".into()))
            }
        }
    }
}
