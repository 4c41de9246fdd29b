//! Exponential backoff: `delay(attempt) = min(base * exp_base^attempt, max_delay)`.
//!
//! Pure data, `Copy`, no shared state; one instance can serve every caller.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Backoff {
    #[serde(default = "default_base")]
    pub base: f64,
    #[serde(default = "default_exp_base")]
    pub exp_base: f64,
    #[serde(default = "default_max_delay")]
    pub max_delay: f64,
}

fn default_base() -> f64 {
    1.0
}
fn default_exp_base() -> f64 {
    2.0
}
fn default_max_delay() -> f64 {
    60.0
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: default_base(),
            exp_base: default_exp_base(),
            max_delay: default_max_delay(),
        }
    }
}

impl Backoff {
    pub fn new(base: f64, exp_base: f64, max_delay: f64) -> Self {
        Self {
            base,
            exp_base,
            max_delay,
        }
    }

    /// Seconds to wait before retry number `attempt` (0-based). Never negative.
    pub fn delay(&self, attempt: u32) -> f64 {
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        let raw = self.base * self.exp_base.powi(exp);
        if raw.is_nan() {
            return 0.0;
        }
        raw.min(self.max_delay).max(0.0)
    }

    /// Sleep for `delay(attempt)` and return it.
    pub async fn wait_attempt(&self, attempt: u32) -> f64 {
        let d = self.delay(attempt);
        if d > 0.0 {
            tokio::time::sleep(Duration::try_from_secs_f64(d).unwrap_or(Duration::MAX)).await;
        }
        d
    }
}
