//! Probe command.
//!
//! Runs one capability through the relay and renders the resulting envelope.
//! `--values` sends a POST body of the form `{"values": [...]}`; `--post`
//! forces a POST with an empty object when no values are given.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use serde_json::{json, Value};

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct ProbeArgs {
    /// Capability name (see `quantdash capabilities`)
    pub capability: String,

    /// Query parameter forwarded to the upstream, as key=value (repeatable)
    #[arg(short, long = "query", value_parser = parse_key_val)]
    pub query: Vec<(String, String)>,

    /// Comma-separated input series, sent as the POST body
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    pub values: Vec<f64>,

    /// Send a POST even without values
    #[arg(long)]
    pub post: bool,
}

/// Parse a `key=value` pair.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=value: no `=` found in `{}`", s))?;
    if key.is_empty() {
        return Err(format!("invalid KEY=value: empty key in `{}`", s));
    }
    Ok((key.to_string(), value.to_string()))
}

fn request_body(args: &ProbeArgs) -> Option<Value> {
    if !args.values.is_empty() {
        Some(json!({ "values": args.values }))
    } else if args.post {
        Some(json!({}))
    } else {
        None
    }
}

fn str_field<'a>(envelope: &'a Value, key: &str) -> Option<&'a str> {
    envelope.get(key).and_then(|v| v.as_str())
}

/// Human-readable age of the `lastUpdated` stamp.
fn age(last_updated: &str, now: DateTime<Utc>) -> Option<String> {
    let stamp = DateTime::parse_from_rfc3339(last_updated).ok()?;
    let millis = (now - stamp.with_timezone(&Utc)).num_milliseconds().max(0);
    Some(if millis < 1_000 {
        format!("{}ms ago", millis)
    } else {
        format!("{}s ago", millis / 1_000)
    })
}

pub async fn execute(args: ProbeArgs, client: &ApiClient, format: OutputFormat) -> Result<()> {
    let body = request_body(&args);
    let envelope = client
        .run_capability(&args.capability, &args.query, body.as_ref())
        .await
        .with_context(|| format!("Probe of '{}' failed", args.capability))?;

    match format {
        OutputFormat::Table => render(&args.capability, &envelope),
        _ => output::print_item(&envelope, format)?,
    }

    Ok(())
}

fn render(capability: &str, envelope: &Value) {
    let status = str_field(envelope, "status").unwrap_or("unknown");

    output::print_header(&format!("Capability: {}", capability));
    output::print_detail("Status", &output::status_label(status).to_string());

    match str_field(envelope, "endpoint_url") {
        Some(url) => output::print_detail("Endpoint", url),
        None => output::print_detail("Endpoint", "(static)"),
    }
    if let Some(code) = envelope.get("endpoint_status").and_then(|v| v.as_u64()) {
        let shown = if code == 0 {
            "no response".to_string()
        } else {
            code.to_string()
        };
        output::print_detail("HTTP Status", &shown);
    }
    if let Some(latency) = envelope.get("latency_ms").and_then(|v| v.as_u64()) {
        output::print_detail("Latency", &format!("{}ms", latency));
    }
    if let Some(stamp) = str_field(envelope, "lastUpdated") {
        let shown = match age(stamp, Utc::now()) {
            Some(age) => format!("{} ({})", stamp, age),
            None => stamp.to_string(),
        };
        output::print_detail("Last Updated", &shown);
    }

    let points = envelope
        .get("chartData")
        .and_then(|v| v.as_array())
        .map(|a| a.len())
        .unwrap_or(0);
    output::print_detail("Chart Points", &points.to_string());

    if let Some(error) = envelope.pointer("/data/error").and_then(|v| v.as_str()) {
        output::print_detail("Error", error);
    }
    if envelope.get("debug").is_some() {
        output::print_info("Debug block present; use -o json to see it");
    }

    println!();
    match status {
        "online" => output::print_success("Upstream answered"),
        "degraded" => output::print_warning("Backend is up but the call failed"),
        _ => output::print_error("Backend is unreachable"),
    }
}
