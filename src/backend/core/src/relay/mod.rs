//! The aggregation pipeline.
//!
//! One request runs two independent branches concurrently:
//!
//! ```text
//!            ┌── CandidateSequencer ── UpstreamCaller ── Transport ──┐
//! Relay::run ┤                                                       ├─ assemble ─ ResponseEnvelope
//!            └── HealthProber ─────────────────────────── Transport ──┘
//! ```
//!
//! Neither branch can fail: transport, timeout and decode problems end up in
//! the envelope's `status` and `data.error`. The only error [`Relay::run`]
//! returns is an unknown capability name.

pub mod caller;
pub mod sequencer;
pub mod timeout;
pub mod transport;

use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, Instrument};
use uuid::Uuid;

use crate::capability::{BodyTemplate, Capability, HttpMethod, RequestContext};
use crate::config::Config;
use crate::envelope::{assemble, ResponseEnvelope};
use crate::error::{RelayError, Result};
use crate::health::{HealthProber, HealthSignal};
use crate::series::DEFAULT_CHART_CAP;
use crate::telemetry::RelayMetrics;

pub use caller::{AttemptResult, CandidateRef, UpstreamCaller};
pub use sequencer::{CandidateSequencer, Resolution};
pub use timeout::{race, TimeoutError};
pub use transport::{HttpTransport, ResponseBody, Transport, UpstreamRequest, UpstreamResponse};

// ═══════════════════════════════════════════════════════════════════════════════
// Capability Registry
// ═══════════════════════════════════════════════════════════════════════════════

/// Immutable set of capabilities, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    capabilities: BTreeMap<String, Arc<Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a capability, replacing any with the same name.
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities
            .insert(capability.name.clone(), Arc::new(capability));
        self
    }

    /// Validate the configuration and resolve every capability.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let registry = config
            .resolve_capabilities()?
            .into_iter()
            .fold(Self::new(), Self::with_capability);
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Capability>> {
        self.capabilities.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Capabilities in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.capabilities.values().map(Arc::as_ref)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Relay
// ═══════════════════════════════════════════════════════════════════════════════

/// Pipeline-wide settings.
#[derive(Debug, Clone, Copy)]
pub struct RelaySettings {
    /// Attach a debug block to every envelope
    pub debug: bool,

    /// Maximum chart points per envelope
    pub chart_cap: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            debug: false,
            chart_cap: DEFAULT_CHART_CAP,
        }
    }
}

impl RelaySettings {
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_chart_cap(mut self, chart_cap: usize) -> Self {
        self.chart_cap = chart_cap;
        self
    }
}

/// Resolves capability requests into envelopes.
pub struct Relay {
    registry: CapabilityRegistry,
    sequencer: CandidateSequencer,
    prober: HealthProber,
    settings: RelaySettings,
}

impl Relay {
    /// Create a relay over `transport`; data calls and health probes share it.
    pub fn new(registry: CapabilityRegistry, transport: Arc<dyn Transport>, settings: RelaySettings) -> Self {
        Self {
            registry,
            sequencer: CandidateSequencer::new(UpstreamCaller::new(transport.clone())),
            prober: HealthProber::new(transport),
            settings,
        }
    }

    /// Build a relay with the HTTP transport from validated configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let registry = CapabilityRegistry::from_config(config)?;
        let transport = HttpTransport::new().map_err(|e| {
            RelayError::internal("failed to build HTTP client").with_source(e)
        })?;
        let settings = RelaySettings::default()
            .with_debug(config.relay.debug)
            .with_chart_cap(config.relay.chart_cap);
        Ok(Self::new(registry, Arc::new(transport), settings))
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn settings(&self) -> RelaySettings {
        self.settings
    }

    /// Run the named capability.
    pub async fn run(&self, name: &str, ctx: &RequestContext) -> Result<ResponseEnvelope> {
        let capability = self
            .registry
            .get(name)
            .ok_or_else(|| RelayError::capability_not_found(name))?;
        Ok(self.run_capability(&capability, ctx).await)
    }

    /// Run a capability. Never fails.
    pub async fn run_capability(&self, capability: &Capability, ctx: &RequestContext) -> ResponseEnvelope {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "relay",
            capability = %capability.name,
            request_id = %request_id
        );

        async move {
            if let Some(preset) = &capability.preset {
                let envelope = ResponseEnvelope::preset(preset, self.settings.chart_cap);
                RelayMetrics::record_envelope(&capability.name, envelope.status);
                info!(status = %envelope.status, "Served preset");
                return self.decorate(envelope, || json!({ "request_id": request_id, "preset": true }));
            }

            let (resolution, health) = tokio::join!(
                self.sequencer.resolve_traced(capability, ctx),
                self.prober.probe(capability),
            );

            let envelope = assemble(&resolution.best, health, self.settings.chart_cap);
            RelayMetrics::record_envelope(&capability.name, envelope.status);
            info!(
                status = %envelope.status,
                endpoint = envelope.endpoint_url.as_deref().unwrap_or("-"),
                latency_ms = envelope.latency_ms,
                attempts = resolution.tried.len(),
                chart_points = envelope.chart_data.len(),
                "Capability resolved"
            );

            self.decorate(envelope, || debug_block(capability, &resolution, health, request_id))
        }
        .instrument(span)
        .await
    }

    fn decorate(&self, envelope: ResponseEnvelope, debug: impl FnOnce() -> Value) -> ResponseEnvelope {
        if self.settings.debug {
            envelope.with_debug(debug())
        } else {
            envelope
        }
    }
}

/// Diagnostic block attached when debug is enabled.
fn debug_block(capability: &Capability, resolution: &Resolution, health: HealthSignal, request_id: Uuid) -> Value {
    let best = &resolution.best;
    json!({
        "request_id": request_id,
        "method": best.candidate.as_ref().map(|c| c.method),
        "tried": resolution.tried,
        "http_status": best.status,
        "headers": best.headers,
        "error_kind": best.error.as_ref().map(|e| e.kind()),
        "healthy": health.is_up(),
        "values_sent": values_sent(capability, best),
    })
}

/// Length of the series body sent by the reported candidate, if any.
fn values_sent(capability: &Capability, best: &AttemptResult) -> Option<usize> {
    let reported = best.candidate.as_ref()?;
    capability
        .candidates
        .iter()
        .filter(|c| c.method == HttpMethod::Post)
        .find(|c| c.url == reported.url && reported.method == HttpMethod::Post)
        .and_then(|c| match &c.body {
            BodyTemplate::Series { length, .. } => Some(*length),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Candidate;

    #[test]
    fn test_registry_lookup() {
        let registry = CapabilityRegistry::new()
            .with_capability(Capability::new("forecast"))
            .with_capability(Capability::new("montecarlo"));

        assert_eq!(registry.len(), 2);
        assert!(registry.get("forecast").is_some());
        assert!(registry.get("nope").is_none());

        let names: Vec<&str> = registry.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["forecast", "montecarlo"]);
    }

    #[test]
    fn test_registry_from_default_config() {
        let config = Config::default().with_builtin_capabilities();
        let registry = CapabilityRegistry::from_config(&config).unwrap();
        assert!(registry.get("forecast").is_some());
        assert!(registry.get("sentiment").unwrap().is_static());
    }

    #[test]
    fn test_values_sent_only_for_series_posts() {
        let capability = Capability::new("forecast")
            .with_candidate(
                Candidate::post("https://fc.example/predict").with_body(BodyTemplate::series("values", 12)),
            )
            .with_candidate(Candidate::get("https://fc.example/latest"));

        let post = AttemptResult {
            candidate: Some(CandidateRef {
                url: "https://fc.example/predict".into(),
                method: HttpMethod::Post,
            }),
            ..AttemptResult::no_candidates()
        };
        let get = AttemptResult {
            candidate: Some(CandidateRef {
                url: "https://fc.example/latest".into(),
                method: HttpMethod::Get,
            }),
            ..AttemptResult::no_candidates()
        };

        assert_eq!(values_sent(&capability, &post), Some(12));
        assert_eq!(values_sent(&capability, &get), None);
        assert_eq!(values_sent(&capability, &AttemptResult::no_candidates()), None);
    }
}
