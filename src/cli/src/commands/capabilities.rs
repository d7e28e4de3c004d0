//! Capability listing command.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Debug, Serialize, Deserialize)]
pub struct CandidateInfo {
    pub method: String,
    pub url: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CapabilityInfo {
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub candidates: Vec<CandidateInfo>,
    #[serde(default)]
    pub health_targets: Vec<String>,
}

/// Table row for the capability list.
#[derive(Debug, Serialize, Tabled)]
struct CapabilityRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Candidates")]
    candidates: usize,
    #[tabled(rename = "Primary")]
    primary: String,
    #[tabled(rename = "Health Targets")]
    health_targets: usize,
}

impl From<&CapabilityInfo> for CapabilityRow {
    fn from(info: &CapabilityInfo) -> Self {
        let primary = info
            .candidates
            .first()
            .map(|c| format!("{} {} ({}ms)", c.method, c.url, c.timeout_ms))
            .unwrap_or_else(|| "-".to_string());
        Self {
            name: info.name.clone(),
            kind: info.kind.clone(),
            candidates: info.candidates.len(),
            primary,
            health_targets: info.health_targets.len(),
        }
    }
}

pub async fn execute(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let capabilities: Vec<CapabilityInfo> = client.get("/api/capabilities").await?;

    match format {
        OutputFormat::Table => {
            let rows: Vec<CapabilityRow> = capabilities.iter().map(CapabilityRow::from).collect();
            output::print_list(&rows, format)?;
        }
        _ => output::print_item(&capabilities, format)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_from_listing() {
        let info: CapabilityInfo = serde_json::from_value(serde_json::json!({
            "name": "forecast",
            "kind": "upstream",
            "candidates": [
                {"method": "POST", "url": "https://gw.example/v1/forecast/predict", "timeout_ms": 7000},
                {"method": "POST", "url": "https://fc.example/predict", "timeout_ms": 7000}
            ],
            "health_targets": ["https://fc.example/health"]
        }))
        .unwrap();

        let row = CapabilityRow::from(&info);
        assert_eq!(row.candidates, 2);
        assert_eq!(row.health_targets, 1);
        assert_eq!(row.primary, "POST https://gw.example/v1/forecast/predict (7000ms)");
    }

    #[test]
    fn test_static_row_has_no_primary() {
        let info: CapabilityInfo = serde_json::from_value(serde_json::json!({
            "name": "sentiment",
            "kind": "static"
        }))
        .unwrap();

        let row = CapabilityRow::from(&info);
        assert_eq!(row.candidates, 0);
        assert_eq!(row.primary, "-");
    }
}
