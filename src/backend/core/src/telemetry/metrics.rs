//! Prometheus metrics for upstream attempts, health probes and envelopes.
//!
//! Recording goes through the `metrics` facade, so the helpers below are
//! no-ops until [`init_metrics`] installs the Prometheus recorder. Tests
//! never install it.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::envelope::ReportedStatus;
use crate::relay::caller::AttemptResult;

/// Handle of the installed recorder.
static METRICS_REGISTRY: OnceLock<MetricsRegistry> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Whether metrics collection is enabled
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,

    /// Histogram buckets for upstream latency (in seconds)
    #[serde(default = "default_latency_buckets")]
    pub latency_buckets: Vec<f64>,

    /// Labels added to every metric
    #[serde(default)]
    pub global_labels: HashMap<String, String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            latency_buckets: default_latency_buckets(),
            global_labels: HashMap::new(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_latency_buckets() -> Vec<f64> {
    // free-tier backends cold-start in several seconds
    vec![0.05, 0.1, 0.25, 0.5, 1.0, 1.5, 2.5, 5.0, 6.5, 10.0]
}

/// Access to the rendered exposition.
pub struct MetricsRegistry {
    prometheus_handle: Option<PrometheusHandle>,
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("prometheus_handle", &self.prometheus_handle.is_some())
            .finish()
    }
}

impl MetricsRegistry {
    /// The process-wide registry; empty when metrics are disabled.
    pub fn global() -> &'static MetricsRegistry {
        METRICS_REGISTRY.get_or_init(|| MetricsRegistry {
            prometheus_handle: None,
        })
    }

    /// Whether a recorder is installed.
    pub fn is_installed(&self) -> bool {
        self.prometheus_handle.is_some()
    }

    /// Render all metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.prometheus_handle
            .as_ref()
            .map(|h| h.render())
            .unwrap_or_default()
    }
}

/// Install the Prometheus recorder and register metric descriptions.
///
/// # Errors
///
/// Returns an error if the buckets are invalid or a recorder is already
/// installed.
pub fn init_metrics(config: &MetricsConfig, service_name: &str) -> anyhow::Result<&'static MetricsRegistry> {
    if !config.enabled {
        tracing::info!("Metrics disabled");
        return Ok(MetricsRegistry::global());
    }

    let mut builder = PrometheusBuilder::new().add_global_label("service", service_name);
    for (key, value) in &config.global_labels {
        builder = builder.add_global_label(key, value);
    }
    builder = builder.set_buckets(&config.latency_buckets)?;

    let handle = builder.install_recorder()?;
    register_metric_descriptions();

    if METRICS_REGISTRY
        .set(MetricsRegistry {
            prometheus_handle: Some(handle),
        })
        .is_err()
    {
        anyhow::bail!("metrics registry initialized twice");
    }

    tracing::info!(service_name = %service_name, "Metrics initialized");
    Ok(MetricsRegistry::global())
}

fn register_metric_descriptions() {
    describe_counter!(
        "quantdash_upstream_attempts_total",
        "Upstream candidate attempts by capability and outcome"
    );
    describe_histogram!(
        "quantdash_upstream_latency_seconds",
        "Latency of completed upstream attempts in seconds"
    );
    describe_counter!(
        "quantdash_health_probes_total",
        "Health probes by capability and result"
    );
    describe_counter!(
        "quantdash_envelopes_total",
        "Envelopes returned by capability and reported status"
    );
    describe_counter!("quantdash_errors_total", "Caller-facing errors by code");
}

/// Recording helpers for the relay pipeline.
pub struct RelayMetrics;

impl RelayMetrics {
    /// One candidate attempt.
    pub fn record_attempt(capability: &str, attempt: &AttemptResult) {
        let outcome = match &attempt.error {
            None => "success",
            Some(error) => error.kind(),
        };
        counter!(
            "quantdash_upstream_attempts_total",
            "capability" => capability.to_string(),
            "outcome" => outcome,
        )
        .increment(1);

        if let Some(latency_ms) = attempt.latency_ms {
            histogram!(
                "quantdash_upstream_latency_seconds",
                "capability" => capability.to_string(),
            )
            .record(latency_ms as f64 / 1000.0);
        }
    }

    /// One health probe round for a capability.
    pub fn record_health(capability: &str, healthy: bool) {
        counter!(
            "quantdash_health_probes_total",
            "capability" => capability.to_string(),
            "healthy" => if healthy { "true" } else { "false" },
        )
        .increment(1);
    }

    /// One envelope handed back to the caller.
    pub fn record_envelope(capability: &str, status: ReportedStatus) {
        counter!(
            "quantdash_envelopes_total",
            "capability" => capability.to_string(),
            "status" => status.as_str(),
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpstreamError;

    #[test]
    fn test_metrics_config_defaults() {
        let config = MetricsConfig::default();
        assert!(config.enabled);
        assert!(config.latency_buckets.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_render_without_recorder_is_empty() {
        let registry = MetricsRegistry {
            prometheus_handle: None,
        };
        assert!(!registry.is_installed());
        assert!(registry.render().is_empty());
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        let attempt = AttemptResult::failed(None, UpstreamError::Timeout { budget_ms: 10 });
        RelayMetrics::record_attempt("forecast", &attempt);
        RelayMetrics::record_health("forecast", false);
        RelayMetrics::record_envelope("forecast", ReportedStatus::Offline);
    }
}
