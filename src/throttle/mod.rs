//! Per-source request throttling and retry delays.

pub mod backoff;
pub mod rate_limiter;

pub use backoff::Backoff;
pub use rate_limiter::RateLimiter;
