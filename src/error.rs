//! Error taxonomy for connector calls and orchestrator setup.
//!
//! `SourceError` never escapes the orchestrator: every variant is caught,
//! classified and either retried, swallowed (parse errors) or recorded as a
//! per-source failure. `OrchestratorError` is the only error a caller sees
//! and only covers malformed configuration.

use thiserror::Error;

/// Outcome of a single failed connector call.
///
/// `Display` is the short reason string stored in the report's
/// `sourcesFailed` list, so keep the messages terse.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    /// Transport failure, 5xx-equivalent, or anything the connector did not classify.
    #[error("{0}")]
    Transient(String),

    /// The call (or one attempt of it) exceeded its time budget.
    #[error("timeout")]
    Timeout,

    /// 429-equivalent. `retry_after` is the server hint in seconds, if any.
    #[error("rate limited")]
    RateLimited { retry_after: Option<f64> },

    /// Missing credentials or keys; retrying cannot fix it.
    #[error("configuration: {0}")]
    Config(String),

    /// The source answered but the payload could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),

    /// The run was cancelled or hit its deadline while this call was in flight.
    #[error("cancelled")]
    Cancelled,
}

impl SourceError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SourceError::Transient(_) | SourceError::Timeout | SourceError::RateLimited { .. }
        )
    }

    /// Errors that short-circuit the retry loop immediately.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SourceError::Config(_) | SourceError::Cancelled)
    }

    /// Parse errors mean "ran, found nothing" and are not reported as failures.
    pub fn counts_as_failure(&self) -> bool {
        !matches!(self, SourceError::Parse(_))
    }
}

impl From<anyhow::Error> for SourceError {
    fn from(e: anyhow::Error) -> Self {
        SourceError::Transient(format!("{e:#}"))
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(e: serde_json::Error) -> Self {
        SourceError::Parse(e.to_string())
    }
}

/// Configuration problems detected when building an orchestrator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("no sources configured")]
    NoSources,

    #[error("duplicate source name: {0}")]
    DuplicateSource(String),

    #[error("source name must not be empty")]
    EmptySourceName,

    #[error("source {name}: confidence {value} outside [0, 1]")]
    InvalidConfidence { name: String, value: String },

    #[error("gap strategy for category {category} names unknown source {name}")]
    UnknownStrategySource { category: String, name: String },

    #[error("max_concurrency must be at least 1")]
    ZeroConcurrency,
}
