//! Error handling for the QuantDash relay.
//!
//! This module provides:
//! - `UpstreamError`, the taxonomy of per-attempt failures (transport, timeout,
//!   decode, logical). These never escape the upstream caller; they are folded
//!   into an `AttemptResult` and only surface as diagnostics.
//! - `RelayError`, the crate error with a machine-readable `ErrorCode` and HTTP
//!   status mapping, used for configuration loading and validation failures
//!   and caller mistakes (unknown capability).
//!
//! # Usage
//!
//! ```rust,ignore
//! use quantdash_core::error::{RelayError, Result};
//!
//! fn lookup(name: &str) -> Result<()> {
//!     Err(RelayError::capability_not_found(name))
//! }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

// ═══════════════════════════════════════════════════════════════════════════════
// Result Type Alias
// ═══════════════════════════════════════════════════════════════════════════════

/// A specialized Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Upstream Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// Failure of a single upstream attempt.
///
/// Every variant is converted into a failed `AttemptResult` at the caller
/// boundary, so the candidate sequencer always advances to the next candidate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// Connection refused, DNS failure, reset.
    #[error("transport error: {0}")]
    Transport(String),

    /// Deadline exceeded before the upstream answered.
    #[error("timeout after {budget_ms}ms")]
    Timeout { budget_ms: u64 },

    /// Body was neither valid JSON nor readable text.
    #[error("undecodable response body: {0}")]
    Decode(String),

    /// Upstream answered with a non-2xx status.
    #[error("upstream returned HTTP {0}")]
    HttpStatus(u16),

    /// HTTP success, but the payload reports an application failure.
    #[error("upstream reported an error: {0}")]
    Logical(String),

    /// The capability has nothing to call.
    #[error("no candidates configured")]
    NoCandidates,
}

impl UpstreamError {
    /// Short stable label, used as a metric label and in debug blocks.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Timeout { .. } => "timeout",
            Self::Decode(_) => "decode",
            Self::HttpStatus(_) => "http_status",
            Self::Logical(_) => "logical",
            Self::NoCandidates => "no_candidates",
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            // reqwest does not expose the configured budget
            Self::Timeout { budget_ms: 0 }
        } else if error.is_connect() {
            Self::Transport(format!("connection failed: {}", error))
        } else if error.is_decode() || error.is_body() {
            Self::Decode(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Capability Errors (1000-1099)
    CapabilityNotFound,

    // Configuration Errors (5000-5099)
    ConfigurationError,
    InvalidConfiguration,
    NoCandidates,

    // Internal Errors (9000-9099)
    InternalError,
}

impl ErrorCode {
    /// Get the numeric code for this error.
    pub const fn numeric_code(&self) -> u32 {
        match self {
            Self::CapabilityNotFound => 1000,

            Self::ConfigurationError => 5000,
            Self::InvalidConfiguration => 5001,
            Self::NoCandidates => 5002,

            Self::InternalError => 9000,
        }
    }

    /// Get the HTTP status code for this error.
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::CapabilityNotFound => StatusCode::NOT_FOUND,
            Self::ConfigurationError
            | Self::InvalidConfiguration
            | Self::NoCandidates
            | Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error category for grouping in logs and metrics.
    pub const fn category(&self) -> &'static str {
        match self.numeric_code() {
            1000..=1099 => "capability",
            5000..=5099 => "configuration",
            9000..=9099 => "internal",
            _ => "unknown",
        }
    }

    /// Whether the error is worth surfacing at `warn` level.
    const fn is_operator_facing(&self) -> bool {
        matches!(self.numeric_code(), 5000..=9099)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Main Error Type
// ═══════════════════════════════════════════════════════════════════════════════

/// The main error type for the relay.
#[derive(Error, Debug)]
pub struct RelayError {
    /// Machine-readable error code
    code: ErrorCode,

    /// User-friendly error message (safe to expose to clients)
    user_message: Cow<'static, str>,

    /// Detailed internal message (for logging only)
    internal_message: Option<String>,

    /// The source error that caused this error
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.user_message)?;
        if let Some(ref internal) = self.internal_message {
            write!(f, " (internal: {})", internal)?;
        }
        Ok(())
    }
}

impl RelayError {
    // ─────────────────────────────────────────────────────────────────────────
    // Constructors
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a new error with code and user message.
    pub fn new(code: ErrorCode, user_message: impl Into<Cow<'static, str>>) -> Self {
        let error = Self {
            code,
            user_message: user_message.into(),
            internal_message: None,
            source: None,
        };
        error.record_metrics();
        error
    }

    /// Create an error with both user and internal messages.
    pub fn with_internal(
        code: ErrorCode,
        user_message: impl Into<Cow<'static, str>>,
        internal_message: impl Into<String>,
    ) -> Self {
        let mut error = Self::new(code, user_message);
        error.internal_message = Some(internal_message.into());
        error
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_internal(
            ErrorCode::InternalError,
            "An internal error occurred",
            message,
        )
    }

    /// The requested capability is not configured.
    pub fn capability_not_found(name: impl AsRef<str>) -> Self {
        Self::new(
            ErrorCode::CapabilityNotFound,
            format!("Capability '{}' is not configured", name.as_ref()),
        )
    }

    /// A capability was configured without any candidate.
    pub fn no_candidates(name: impl AsRef<str>) -> Self {
        Self::new(
            ErrorCode::NoCandidates,
            format!("Capability '{}' has no candidates configured", name.as_ref()),
        )
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfiguration, message.into())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builders
    // ─────────────────────────────────────────────────────────────────────────

    /// Attach a source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    pub fn internal_message(&self) -> Option<&str> {
        self.internal_message.as_deref()
    }

    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Logging & Metrics
    // ─────────────────────────────────────────────────────────────────────────

    /// Log this error at a level matching who has to act on it.
    pub fn log(&self) {
        let code = self.code.to_string();
        let category = self.code.category();
        let status = self.http_status().as_u16();

        if self.code.is_operator_facing() {
            error!(
                error_code = %code,
                category = category,
                http_status = status,
                user_message = %self.user_message,
                internal_message = ?self.internal_message,
                source = ?self.source,
                "Relay error"
            );
        } else {
            warn!(
                error_code = %code,
                category = category,
                http_status = status,
                user_message = %self.user_message,
                "Request rejected"
            );
        }
    }

    fn record_metrics(&self) {
        counter!(
            "quantdash_errors_total",
            "code" => self.code.to_string(),
            "category" => self.code.category().to_string(),
        )
        .increment(1);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// API Response
// ═══════════════════════════════════════════════════════════════════════════════

/// Error response for API clients.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always false for errors
    pub success: bool,

    /// Error information
    pub error: ErrorInfo,
}

/// Detailed error information for API responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Numeric error code
    pub numeric_code: u32,

    /// User-friendly error message
    pub message: String,

    /// Timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl From<&RelayError> for ErrorResponse {
    fn from(error: &RelayError) -> Self {
        Self {
            success: false,
            error: ErrorInfo {
                code: error.code,
                numeric_code: error.code.numeric_code(),
                message: error.user_message.to_string(),
                timestamp: chrono::Utc::now(),
            },
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Axum Integration
// ═══════════════════════════════════════════════════════════════════════════════

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.http_status();
        let response = ErrorResponse::from(&self);

        (status, Json(response)).into_response()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// From Implementations
// ═══════════════════════════════════════════════════════════════════════════════

impl From<config::ConfigError> for RelayError {
    fn from(error: config::ConfigError) -> Self {
        Self::with_internal(
            ErrorCode::ConfigurationError,
            "Failed to load configuration",
            error.to_string(),
        )
        .with_source(error)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
