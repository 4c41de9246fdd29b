// src/orchestrator/source.rs
//! Source descriptors and the one isolated-call combinator every source goes through.
//!
//! `call_isolated` is the only place a connector is invoked:
//! rate limiter → per-attempt timeout → classify the error →
//! backoff/rate-limit wait → retry. Cancellation is checked at every
//! suspension point and surfaces as `SourceError::Cancelled`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::SourceError;
use crate::ingest::config::{RetryConfig, SourceConfig};
use crate::ingest::types::{FetchParams, RawFact, SourceConnector};
use crate::source_weights::SourceWeights;
use crate::throttle::{Backoff, RateLimiter};

/// One configured source: identity, tier, provenance defaults, connector and
/// its own rate limiter.
#[derive(Clone)]
pub struct SourceDescriptor {
    name: String,
    tier: u32,
    priority: u32,
    confidence: f64,
    connector: Arc<dyn SourceConnector>,
    limiter: Arc<RateLimiter>,
}

impl fmt::Debug for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceDescriptor")
            .field("name", &self.name)
            .field("tier", &self.tier)
            .field("priority", &self.priority)
            .field("confidence", &self.confidence)
            .field("rpm", &self.limiter.rpm())
            .field("rpd", &self.limiter.rpd())
            .finish()
    }
}

impl SourceDescriptor {
    /// Priority and confidence default from the built-in source weight table.
    pub fn new(
        name: impl Into<String>,
        tier: u32,
        rpm: u32,
        rpd: u32,
        connector: Arc<dyn SourceConnector>,
    ) -> Self {
        let name = name.into();
        let w = SourceWeights::default_seed().weight_for(&name);
        Self {
            name,
            tier,
            priority: w.priority,
            confidence: w.confidence,
            connector,
            limiter: Arc::new(RateLimiter::new(rpm, rpd)),
        }
    }

    pub fn from_config(
        cfg: &SourceConfig,
        weights: &SourceWeights,
        connector: Arc<dyn SourceConnector>,
    ) -> Self {
        let w = weights.weight_for(&cfg.name);
        Self {
            name: cfg.name.clone(),
            tier: cfg.tier,
            priority: cfg.priority.unwrap_or(w.priority),
            confidence: cfg.confidence.unwrap_or(w.confidence),
            connector,
            limiter: Arc::new(RateLimiter::new(cfg.rpm, cfg.rpd)),
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Not clamped here; `Orchestrator::new` rejects values outside `[0, 1]`.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn tier(&self) -> u32 {
        self.tier
    }
    pub fn priority(&self) -> u32 {
        self.priority
    }
    pub fn confidence(&self) -> f64 {
        self.confidence
    }
    pub fn connector(&self) -> &Arc<dyn SourceConnector> {
        &self.connector
    }
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }
}

/// Retry knobs shared by every call in a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per call for transient errors (at least one is always made).
    pub max_retries: u32,
    pub backoff: Backoff,
    /// Fallback wait after a rate-limited response without `retry_after`.
    pub rate_limited_wait: Duration,
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(r: &RetryConfig) -> Self {
        Self {
            max_retries: r.max_retries,
            backoff: r.backoff(),
            rate_limited_wait: secs(r.rate_limited_wait_secs),
            call_timeout: secs(r.call_timeout_secs),
        }
    }
}

pub(crate) fn secs(x: f64) -> Duration {
    if x.is_nan() || x <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(x).unwrap_or(Duration::MAX)
}

/// Sleep unless cancelled first.
async fn pause(d: Duration, cancel: &CancellationToken) -> Result<(), SourceError> {
    if d.is_zero() {
        return Ok(());
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SourceError::Cancelled),
        _ = tokio::time::sleep(d) => Ok(()),
    }
}

/// Invoke one source with throttling, timeout, retries and cancellation.
///
/// - transient errors and timeouts: back off and retry until `max_retries` attempts are spent
/// - rate-limited: wait `retry_after` (or the policy fallback), then retry once
/// - config/cancelled/parse: returned immediately
pub async fn call_isolated(
    desc: &SourceDescriptor,
    params: &FetchParams,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<Vec<RawFact>, SourceError> {
    let attempts = policy.max_retries.max(1);
    let mut attempt: u32 = 0;
    let mut rate_limit_retry_used = false;

    loop {
        if cancel.is_cancelled() {
            return Err(SourceError::Cancelled);
        }

        let waited = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SourceError::Cancelled),
            w = desc.limiter.wait_if_needed() => w,
        };
        if waited > 0.0 {
            tracing::debug!(source = %desc.name, waited_secs = waited, "rate limiter wait");
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SourceError::Cancelled),
            r = tokio::time::timeout(policy.call_timeout, desc.connector.fetch(params)) => {
                r.unwrap_or(Err(SourceError::Timeout))
            }
        };

        let err = match outcome {
            Ok(facts) => return Ok(facts),
            Err(e) => e,
        };

        match err {
            SourceError::RateLimited { retry_after } => {
                if rate_limit_retry_used {
                    return Err(SourceError::RateLimited { retry_after });
                }
                rate_limit_retry_used = true;
                let wait = retry_after.map(secs).unwrap_or(policy.rate_limited_wait);
                tracing::debug!(
                    source = %desc.name,
                    waited_secs = wait.as_secs_f64(),
                    "rate limited by source; retrying once"
                );
                pause(wait, cancel).await?;
            }
            e if e.is_retryable() => {
                attempt += 1;
                if attempt >= attempts {
                    return Err(e);
                }
                let delay = secs(policy.backoff.delay(attempt - 1));
                tracing::debug!(
                    source = %desc.name,
                    attempt,
                    error = %e,
                    delay_secs = delay.as_secs_f64(),
                    "retrying after transient error"
                );
                pause(delay, cancel).await?;
            }
            e => return Err(e),
        }
    }
}
