//! Liveness command.
//!
//! Queries the relay's `/health` endpoint. This reports on the relay process
//! itself; backend health is only visible through `probe`.

use anyhow::Result;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

pub async fn execute(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health: serde_json::Value = client.get_raw("/health").await?;

    match format {
        OutputFormat::Table => {
            let status = health
                .get("status")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");

            output::print_header("Relay Liveness");
            output::print_detail("Status", &output::status_label(status).to_string());
            output::print_detail("API URL", client.base_url());

            if let Some(version) = health.get("version").and_then(|v| v.as_str()) {
                output::print_detail("Version", version);
            }
            if let Some(uptime) = health.get("uptime_secs").and_then(|v| v.as_u64()) {
                output::print_detail("Uptime", &format!("{}s", uptime));
            }
            if let Some(count) = health.get("capabilities").and_then(|v| v.as_u64()) {
                output::print_detail("Capabilities", &count.to_string());
            }
            if let Some(ts) = health.get("timestamp").and_then(|v| v.as_str()) {
                output::print_detail("Timestamp", ts);
            }

            println!();
            if status == "ok" {
                output::print_success("Relay is up");
            } else {
                output::print_error(&format!("Relay status: {}", status));
            }
        }
        _ => output::print_item(&health, format)?,
    }

    Ok(())
}
