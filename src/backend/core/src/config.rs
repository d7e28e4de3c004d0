//! Configuration management.
//!
//! Sources, lowest precedence first:
//!
//! 1. built-in capability table ([`builtin_capabilities`])
//! 2. optional TOML file named by `QUANTDASH_CONFIG`
//! 3. `QUANTDASH__*` environment variables (`QUANTDASH__RELAY__DEBUG=true`)
//! 4. legacy deployment variables: `CONTROLLER_BASE`, `FORECAST_BASE`,
//!    `MONTECARLO_BASE`, `FRONTEND_DEBUG=1`
//!
//! Candidate URLs are written as a base reference plus a path so that moving
//! a backend only touches one setting.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use crate::capability::{BodyTemplate, Candidate, Capability, HttpMethod};
use crate::error::RelayError;
use crate::series::DEFAULT_CHART_CAP;
use crate::telemetry::{LoggingConfig, MetricsConfig};

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "QUANTDASH_CONFIG";

/// Path segment names that cannot be capability names.
const RESERVED_NAMES: &[&str] = &["capabilities"];

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Pipeline-wide settings
    #[serde(default)]
    pub relay: RelayConfig,

    /// Capability table keyed by name
    #[serde(default)]
    pub capabilities: BTreeMap<String, CapabilityConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Attach a debug block to every envelope
    #[serde(default)]
    pub debug: bool,

    /// Shared controller (gateway) base URL
    #[serde(default = "default_controller_base")]
    pub controller_base: String,

    /// Default budget per candidate attempt
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Budget per health probe
    #[serde(default = "default_health_timeout", with = "humantime_serde")]
    pub health_timeout: Duration,

    /// Paths probed under each health base, in order
    #[serde(default = "default_health_paths")]
    pub health_paths: Vec<String>,

    /// Maximum number of chart points per envelope
    #[serde(default = "default_chart_cap")]
    pub chart_cap: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            debug: false,
            controller_base: default_controller_base(),
            request_timeout: default_request_timeout(),
            health_timeout: default_health_timeout(),
            health_paths: default_health_paths(),
            chart_cap: default_chart_cap(),
        }
    }
}

/// Which base URL a candidate path hangs off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseRef {
    Controller,
    #[default]
    Direct,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidateConfig {
    #[serde(default)]
    pub base: BaseRef,

    /// Path appended to the base, e.g. `/predict`
    #[serde(default)]
    pub path: String,

    #[serde(default)]
    pub method: HttpMethod,

    /// Body template; POST candidates default to passthrough
    #[serde(default)]
    pub body: Option<BodyTemplate>,

    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

impl CandidateConfig {
    fn new(base: BaseRef, method: HttpMethod, path: &str) -> Self {
        Self {
            base,
            path: path.to_string(),
            method,
            body: None,
            timeout: None,
        }
    }

    fn with_body(mut self, body: BodyTemplate) -> Self {
        self.body = Some(body);
        self
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CapabilityConfig {
    /// Overrides `relay.controller_base` for this capability
    #[serde(default)]
    pub controller_base: Option<String>,

    /// The capability's own backend
    #[serde(default)]
    pub direct_base: Option<String>,

    /// Candidates in preference order
    #[serde(default)]
    pub candidates: Vec<CandidateConfig>,

    /// Overrides `relay.request_timeout`
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,

    /// Bases to health-probe; defaults to the bases the candidates use
    #[serde(default)]
    pub health_bases: Option<Vec<BaseRef>>,

    /// Overrides `relay.health_paths`
    #[serde(default)]
    pub health_paths: Option<Vec<String>>,

    /// Fixed payload served without calling upstream
    #[serde(default)]
    pub preset: Option<Value>,
}

impl CapabilityConfig {
    fn direct(base: &str) -> Self {
        Self {
            direct_base: Some(base.to_string()),
            ..Self::default()
        }
    }

    fn preset(payload: Value) -> Self {
        Self {
            preset: Some(payload),
            ..Self::default()
        }
    }

    fn with_candidate(mut self, candidate: CandidateConfig) -> Self {
        self.candidates.push(candidate);
        self
    }

    fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn is_empty(&self) -> bool {
        self.candidates.is_empty() && self.preset.is_none()
    }

    /// Bases probed for health, controller first.
    fn effective_health_bases(&self) -> Vec<BaseRef> {
        if let Some(bases) = &self.health_bases {
            return bases.clone();
        }
        [BaseRef::Controller, BaseRef::Direct]
            .into_iter()
            .filter(|base| self.candidates.iter().any(|c| c.base == *base))
            .collect()
    }

    /// Build the runtime capability.
    pub fn resolve(&self, name: &str, relay: &RelayConfig) -> Result<Capability, RelayError> {
        let controller = normalize_base(self.controller_base.as_deref().unwrap_or(&relay.controller_base));
        let direct = self.direct_base.as_deref().map(normalize_base);
        let base_url = |base: BaseRef| -> Result<String, RelayError> {
            match base {
                BaseRef::Controller => Ok(controller.clone()),
                BaseRef::Direct => direct.clone().ok_or_else(|| {
                    RelayError::invalid_configuration(format!(
                        "capability '{}' references the direct base but none is configured",
                        name
                    ))
                }),
            }
        };

        let mut capability = Capability::new(name)
            .with_request_timeout(self.timeout.unwrap_or(relay.request_timeout))
            .with_health_timeout(relay.health_timeout);

        if let Some(preset) = &self.preset {
            return Ok(capability.with_preset(preset.clone()));
        }

        for entry in &self.candidates {
            let url = join_url(&base_url(entry.base)?, &entry.path);
            let body = match (entry.method, &entry.body) {
                (_, Some(body)) => body.clone(),
                (HttpMethod::Post, None) => BodyTemplate::Passthrough,
                (HttpMethod::Get, None) => BodyTemplate::None,
            };
            let mut candidate = Candidate::new(entry.method, url).with_body(body);
            if let Some(timeout) = entry.timeout {
                candidate = candidate.with_timeout(timeout);
            }
            capability = capability.with_candidate(candidate);
        }

        let health_paths = self.health_paths.as_ref().unwrap_or(&relay.health_paths);
        for base in self.effective_health_bases() {
            let base = base_url(base)?;
            for path in health_paths {
                capability = capability.with_health_target(join_url(&base, path));
            }
        }

        Ok(capability)
    }
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_controller_base() -> String { "https://portfolio-api-ize1.onrender.com".to_string() }
fn default_request_timeout() -> Duration { Duration::from_millis(6000) }
fn default_health_timeout() -> Duration { Duration::from_millis(1500) }
fn default_health_paths() -> Vec<String> { vec!["health".to_string(), "healthz".to_string()] }
fn default_chart_cap() -> usize { DEFAULT_CHART_CAP }

/// Trim whitespace and trailing slashes.
pub fn normalize_base(base: &str) -> String {
    base.trim().trim_end_matches('/').to_string()
}

fn join_url(base: &str, path: &str) -> String {
    let path = path.trim();
    if path.is_empty() {
        base.to_string()
    } else if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

/// Capabilities available without any configuration.
pub fn builtin_capabilities() -> BTreeMap<String, CapabilityConfig> {
    use BaseRef::{Controller, Direct};
    use HttpMethod::{Get, Post};

    let series = BodyTemplate::series("values", 12);
    let mut table = BTreeMap::new();

    table.insert(
        "forecast".to_string(),
        CapabilityConfig::direct("https://forecast-fastapi.onrender.com")
            .with_candidate(
                CandidateConfig::new(Controller, Post, "/v1/forecast/predict").with_body(series.clone()),
            )
            .with_candidate(CandidateConfig::new(Direct, Post, "/predict").with_body(series))
            .with_timeout(Duration::from_millis(7000)),
    );
    table.insert(
        "montecarlo".to_string(),
        CapabilityConfig::direct("https://montecarlo-fastapi.onrender.com")
            .with_candidate(CandidateConfig::new(Controller, Get, "/v1/montecarlo/simulate"))
            .with_candidate(CandidateConfig::new(Direct, Get, "/simulate"))
            .with_candidate(CandidateConfig::new(Controller, Post, "/v1/montecarlo/simulate"))
            .with_candidate(CandidateConfig::new(Direct, Post, "/simulate"))
            .with_timeout(Duration::from_millis(6500)),
    );
    for name in ["elasticity", "rl-pricing", "price-engine"] {
        table.insert(
            name.to_string(),
            CapabilityConfig::direct(&format!("https://{}-fastapi.onrender.com", name))
                .with_candidate(CandidateConfig::new(Direct, Get, &format!("/{}", name))),
        );
    }
    table.insert(
        "sentiment".to_string(),
        CapabilityConfig::preset(json!({
            "model": "sentiment-delta-v1.3.0",
            "sentimentScore": 0.42,
            "priceImpact": "+3.8%",
            "source": "Reddit + Twitter (24h window)"
        })),
    );
    table.insert(
        "volatility".to_string(),
        CapabilityConfig::preset(json!({
            "model": "garch-lstm-volatility-v0.7.8",
            "forecastVolatility": 0.231,
            "modelType": "GARCH + LSTM",
            "horizon": "30 days"
        })),
    );

    table
}

impl Config {
    /// Load configuration from `QUANTDASH_CONFIG` (if set) and the environment.
    pub fn load() -> Result<Self, RelayError> {
        let path = std::env::var(CONFIG_PATH_ENV).ok();
        Self::from_sources(path.as_deref(), &std::env::vars().collect())
    }

    /// Load from a specific file path, layered under the process environment.
    pub fn from_file(path: &str) -> Result<Self, RelayError> {
        Self::from_sources(Some(path), &std::env::vars().collect())
    }

    /// Load from an optional file and an explicit set of environment variables.
    ///
    /// `env` stands in for the process environment: both the `QUANTDASH__*`
    /// overrides and the legacy variables are read from it.
    pub fn from_sources(path: Option<&str>, env: &HashMap<String, String>) -> Result<Self, RelayError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }
        let config = builder
            .add_source(
                config::Environment::with_prefix("QUANTDASH")
                    .separator("__")
                    .source(Some(env.clone())),
            )
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        let cfg = cfg
            .normalized()
            .with_builtin_capabilities()
            .apply_legacy_env(|key| env.get(key).cloned());
        cfg.validate()?;
        Ok(cfg)
    }

    /// Trim whitespace and trailing slashes from every base URL.
    pub fn normalized(mut self) -> Self {
        self.relay.controller_base = normalize_base(&self.relay.controller_base);
        for capability in self.capabilities.values_mut() {
            for base in [&mut capability.controller_base, &mut capability.direct_base] {
                if let Some(url) = base.as_mut() {
                    *url = normalize_base(url);
                }
            }
        }
        self
    }

    /// Fill in built-in capabilities.
    ///
    /// Missing capabilities are added; a configured capability without
    /// candidates or preset inherits the built-in candidates while keeping its
    /// own base and timeout overrides.
    pub fn with_builtin_capabilities(mut self) -> Self {
        for (name, builtin) in builtin_capabilities() {
            match self.capabilities.get_mut(&name) {
                None => {
                    self.capabilities.insert(name, builtin);
                }
                Some(configured) if configured.is_empty() => {
                    configured.candidates = builtin.candidates;
                    configured.preset = builtin.preset;
                    if configured.direct_base.is_none() {
                        configured.direct_base = builtin.direct_base;
                    }
                    if configured.timeout.is_none() {
                        configured.timeout = builtin.timeout;
                    }
                }
                Some(_) => {}
            }
        }
        self
    }

    /// Honor the variables of the original deployment.
    pub fn apply_legacy_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(base) = present("CONTROLLER_BASE") {
            self.relay.controller_base = normalize_base(&base);
        }
        for (key, capability) in [("FORECAST_BASE", "forecast"), ("MONTECARLO_BASE", "montecarlo")] {
            if let Some(base) = present(key) {
                self.capabilities
                    .entry(capability.to_string())
                    .or_default()
                    .direct_base = Some(normalize_base(&base));
            }
        }
        if present("FRONTEND_DEBUG").as_deref().map(str::trim) == Some("1") {
            self.relay.debug = true;
        }
        self
    }

    /// Reject configurations the relay cannot serve.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.relay.chart_cap == 0 {
            return Err(RelayError::invalid_configuration("relay.chart_cap must be positive"));
        }
        if self.relay.request_timeout.is_zero() || self.relay.health_timeout.is_zero() {
            return Err(RelayError::invalid_configuration("relay timeouts must be non-zero"));
        }
        for (name, capability) in &self.capabilities {
            validate_name(name)?;
            if capability.is_empty() {
                return Err(RelayError::no_candidates(name));
            }
            let zero_timeout = capability.timeout.is_some_and(|t| t.is_zero())
                || capability
                    .candidates
                    .iter()
                    .any(|c| c.timeout.is_some_and(|t| t.is_zero()));
            if zero_timeout {
                return Err(RelayError::invalid_configuration(format!(
                    "capability '{}' has a zero timeout",
                    name
                )));
            }

            let resolved = capability.resolve(name, &self.relay)?;
            let urls = resolved
                .candidates
                .iter()
                .map(|c| c.url.as_str())
                .chain(resolved.health_targets.iter().map(String::as_str));
            for url in urls {
                validate_url(name, url)?;
            }
        }
        Ok(())
    }

    /// Resolve every configured capability.
    pub fn resolve_capabilities(&self) -> Result<Vec<Capability>, RelayError> {
        self.capabilities
            .iter()
            .map(|(name, capability)| capability.resolve(name, &self.relay))
            .collect()
    }
}

fn validate_name(name: &str) -> Result<(), RelayError> {
    let well_formed = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !well_formed {
        return Err(RelayError::invalid_configuration(format!(
            "capability name '{}' must be a non-empty URL path segment",
            name
        )));
    }
    if RESERVED_NAMES.contains(&name) {
        return Err(RelayError::invalid_configuration(format!(
            "capability name '{}' is reserved",
            name
        )));
    }
    Ok(())
}

fn validate_url(name: &str, url: &str) -> Result<(), RelayError> {
    match reqwest::Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        Ok(parsed) => Err(RelayError::invalid_configuration(format!(
            "capability '{}': unsupported scheme '{}' in {}",
            name,
            parsed.scheme(),
            url
        ))),
        Err(e) => Err(RelayError::invalid_configuration(format!(
            "capability '{}': invalid URL {}",
            name, url
        ))
        .with_source(e)),
    }
}
