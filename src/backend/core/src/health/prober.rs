//! Upstream liveness probing.
//!
//! Probes are independent of the data call: the prober only asks "does any
//! backend answer a health path with 2xx before its own deadline". Probe
//! bodies are discarded.

use std::sync::Arc;
use tracing::debug;

use crate::capability::Capability;
use crate::relay::timeout::race;
use crate::relay::transport::{Transport, UpstreamRequest};
use crate::telemetry::metrics::RelayMetrics;

/// Liveness bit for a capability's backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthSignal {
    healthy: bool,
}

impl HealthSignal {
    pub const UP: Self = Self { healthy: true };
    pub const DOWN: Self = Self { healthy: false };

    pub fn is_up(&self) -> bool {
        self.healthy
    }
}

impl From<bool> for HealthSignal {
    fn from(healthy: bool) -> Self {
        Self { healthy }
    }
}

/// Polls a capability's health targets in order, stopping at the first 2xx.
#[derive(Clone)]
pub struct HealthProber {
    transport: Arc<dyn Transport>,
}

impl HealthProber {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Probe the capability's backends.
    ///
    /// Returns `UP` at the first target answering 2xx within the capability's
    /// health timeout, `DOWN` once every target failed or timed out.
    pub async fn probe(&self, capability: &Capability) -> HealthSignal {
        for target in &capability.health_targets {
            let request = UpstreamRequest::get(target.as_str());
            let healthy = match race(self.transport.send(&request), capability.health_timeout).await {
                Ok(Ok(response)) => response.is_success(),
                Ok(Err(error)) => {
                    debug!(url = %target, error = %error, "Health probe failed");
                    false
                }
                Err(timeout) => {
                    debug!(url = %target, budget_ms = timeout.budget_ms(), "Health probe timed out");
                    false
                }
            };

            if healthy {
                RelayMetrics::record_health(&capability.name, true);
                return HealthSignal::UP;
            }
        }

        RelayMetrics::record_health(&capability.name, false);
        HealthSignal::DOWN
    }
}
