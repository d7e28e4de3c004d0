//! Ordered fallback over a capability's candidates.

use tracing::{debug, info, warn};

use super::caller::{AttemptResult, CandidateRef, UpstreamCaller};
use crate::capability::{Capability, RequestContext};
use crate::telemetry::metrics::RelayMetrics;

/// Everything the sequencer learned in one run.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The winning attempt, or the first failure when nothing succeeded
    pub best: AttemptResult,

    /// Candidates actually invoked, in order
    pub tried: Vec<CandidateRef>,
}

/// Tries candidates strictly in order, stopping at the first success.
///
/// Each candidate is attempted at most once per request; there is no retry.
/// When every candidate fails the FIRST attempt is reported, so the caller
/// sees the most-preferred endpoint's diagnostic.
#[derive(Clone)]
pub struct CandidateSequencer {
    caller: UpstreamCaller,
}

impl CandidateSequencer {
    pub fn new(caller: UpstreamCaller) -> Self {
        Self { caller }
    }

    /// Resolve a capability to its best attempt.
    pub async fn resolve(&self, capability: &Capability, ctx: &RequestContext) -> AttemptResult {
        self.resolve_traced(capability, ctx).await.best
    }

    /// Resolve and keep the list of invoked candidates.
    pub async fn resolve_traced(&self, capability: &Capability, ctx: &RequestContext) -> Resolution {
        let plan = capability.plan(ctx);
        if plan.is_empty() {
            warn!(capability = %capability.name, "No candidates configured");
            return Resolution {
                best: AttemptResult::no_candidates(),
                tried: Vec::new(),
            };
        }

        let mut first_failure: Option<AttemptResult> = None;
        let mut tried = Vec::with_capacity(plan.len());

        for (position, (request, deadline)) in plan.iter().enumerate() {
            tried.push(CandidateRef::from(request));
            let attempt = self.caller.call(request, *deadline).await;
            RelayMetrics::record_attempt(&capability.name, &attempt);

            if attempt.success {
                info!(
                    capability = %capability.name,
                    url = %request.url,
                    position = position,
                    "Candidate succeeded"
                );
                return Resolution { best: attempt, tried };
            }

            debug!(
                capability = %capability.name,
                url = %request.url,
                status = attempt.status,
                error = ?attempt.error,
                "Candidate failed, falling back"
            );
            first_failure.get_or_insert(attempt);
        }

        warn!(capability = %capability.name, attempts = tried.len(), "All candidates failed");
        Resolution {
            best: first_failure.unwrap_or_else(AttemptResult::no_candidates),
            tried,
        }
    }
}
