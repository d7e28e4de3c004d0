//! Structured logging with JSON, pretty and compact formats.
//!
//! The relay logs through `tracing`; this module only installs the
//! subscriber. Per-module levels layer on top of the base level, e.g.
//! `quantdash_core::relay=debug` while everything else stays at `info`.

use serde::Deserialize;
use std::collections::HashMap;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Base log level or filter directive (`info`, `warn,tower_http=debug`)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format
    #[serde(default)]
    pub format: LogFormat,

    /// Per-module log levels
    #[serde(default)]
    pub module_levels: HashMap<String, String>,

    /// Whether to include file/line information
    #[serde(default)]
    pub include_location: bool,

    /// Whether to include target (module path)
    #[serde(default = "default_include_target")]
    pub include_target: bool,

    /// Emit an event when a span closes (carries span duration)
    #[serde(default = "default_span_close")]
    pub span_close: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            module_levels: HashMap::new(),
            include_location: false,
            include_target: default_include_target(),
            span_close: default_span_close(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Multi-line human readable output
    Pretty,
    /// Single-line human readable output
    Compact,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_include_target() -> bool {
    true
}

fn default_span_close() -> bool {
    false
}

impl LoggingConfig {
    /// Build the filter from the base level and per-module directives.
    ///
    /// `RUST_LOG`, when set, replaces the configured base level.
    pub fn env_filter(&self) -> anyhow::Result<EnvFilter> {
        let base = std::env::var("RUST_LOG").unwrap_or_else(|_| self.level.clone());
        let mut filter = EnvFilter::try_new(base)?;
        for (module, level) in &self.module_levels {
            filter = filter.add_directive(format!("{}={}", module, level).parse()?);
        }
        Ok(filter)
    }

    fn span_events(&self) -> FmtSpan {
        if self.span_close {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns an error for an invalid filter directive or when a global
/// subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = config.env_filter()?;

    match config.format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_span_events(config.span_events())
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_target(config.include_target);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
        }
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_span_events(config.span_events())
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_target(config.include_target);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
        }
        LogFormat::Compact => {
            let fmt_layer = fmt::layer()
                .compact()
                .with_span_events(config.span_events())
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_target(config.include_target);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.include_target);
        assert!(!config.include_location);
    }

    #[test]
    fn test_format_deserializes_lowercase() {
        let config: LoggingConfig =
            serde_json::from_str(r#"{"format": "compact", "level": "debug"}"#).unwrap();
        assert_eq!(config.format, LogFormat::Compact);
        assert_eq!(config.level, "debug");
    }

    #[test]
    fn test_module_levels_become_directives() {
        let mut config = LoggingConfig::default();
        config
            .module_levels
            .insert("quantdash_core::relay".into(), "debug".into());
        assert!(config.env_filter().is_ok());
    }

    #[test]
    fn test_invalid_module_level_rejected() {
        let mut config = LoggingConfig::default();
        config
            .module_levels
            .insert("quantdash_core".into(), "not a level!".into());
        assert!(config.env_filter().is_err());
    }
}
