//! Telemetry: structured logging and Prometheus metrics.
//!
//! - **Logging**: `tracing` events rendered as JSON, pretty or compact lines
//! - **Metrics**: upstream attempt, health probe and envelope counters
//!   exposed at `/metrics`
//!
//! # Example
//!
//! ```rust,no_run
//! use quantdash_core::telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::default();
//! init_telemetry(&config).expect("Failed to initialize telemetry");
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use metrics::{init_metrics, MetricsConfig, MetricsRegistry, RelayMetrics};

use serde::Deserialize;

/// Unified telemetry configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Service name attached to every metric
    #[serde(default = "default_service_name")]
    pub service_name: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

fn default_service_name() -> String {
    "quantdash-relay".to_string()
}

/// Initialize logging, then metrics.
///
/// Call once at startup.
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<&'static MetricsRegistry> {
    init_logging(&config.logging)?;
    let registry = init_metrics(&config.metrics, &config.service_name)?;
    ::tracing::info!(service_name = %config.service_name, "Telemetry initialized");
    Ok(registry)
}
