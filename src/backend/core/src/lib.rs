#![allow(clippy::result_large_err)]
//! # QuantDash Core
//!
//! Resilient upstream aggregation layer for the quant dashboard.
//!
//! ## Architecture
//!
//! - **Capability**: named data intent with ordered fallback candidates
//! - **Relay**: timeout guard, upstream caller and candidate sequencer,
//!   run alongside the health prober
//! - **Envelope**: status fusion and the normalized response handed to the UI
//! - **Series**: numeric series extraction and chart downsampling
//! - **API**: axum routes exposing capabilities over HTTP
//! - **Telemetry**: structured logging and Prometheus metrics

pub mod api;
pub mod capability;
pub mod config;
pub mod envelope;
pub mod error;
pub mod health;
pub mod relay;
pub mod series;
pub mod telemetry;

pub use error::{ErrorCode, RelayError, Result, UpstreamError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::capability::{BodyTemplate, Candidate, Capability, HttpMethod, RequestContext};
    pub use crate::config::Config;
    pub use crate::envelope::{assemble, fuse, ReportedStatus, ResponseEnvelope};
    pub use crate::error::{ErrorCode, RelayError, Result, UpstreamError};
    pub use crate::health::{HealthProber, HealthSignal};
    pub use crate::relay::{
        AttemptResult, CandidateSequencer, CapabilityRegistry, HttpTransport, Relay, RelaySettings,
        Transport, UpstreamCaller, UpstreamRequest, UpstreamResponse,
    };
    pub use crate::series::{extract, ChartPoint};
}
