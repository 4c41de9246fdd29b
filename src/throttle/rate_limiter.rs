//! # Rate Limiter
//! Requests-per-minute and requests-per-day throttle for one source.
//!
//! Keeps a 60s sliding window of admission instants plus a daily counter
//! that resets every 86 400s. The whole check-and-update runs under one
//! async mutex, held across the sleep, so concurrent callers on the same
//! instance queue up and the per-window bound holds when they wake.
//!
//! `rpm = 0` or `rpd = 0` never admits a call without waiting: every call
//! sleeps a full window (or a full day). That is a configuration mistake,
//! not an error this type reports.
//!
//! Time comes from `tokio::time::Instant`, so tests can pause and advance
//! the clock.

use std::collections::VecDeque;
use std::time::Duration;

use metrics::histogram;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::metrics::RATE_LIMIT_WAIT;

const WINDOW: Duration = Duration::from_secs(60);
const DAY: Duration = Duration::from_secs(86_400);
const WINDOW_SLACK_SECS: f64 = 0.1;
const DAY_SLACK_SECS: f64 = 1.0;

#[derive(Debug)]
pub struct RateLimiter {
    rpm: u32,
    rpd: u32,
    state: Mutex<RateWindow>,
}

#[derive(Debug)]
struct RateWindow {
    /// Admission instants within the last 60s, oldest first.
    window: VecDeque<Instant>,
    daily_count: u32,
    day_start: Instant,
}

impl RateWindow {
    fn prune(&mut self, now: Instant) {
        while let Some(&t) = self.window.front() {
            if now.duration_since(t) >= WINDOW {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }

    fn admit(&mut self, now: Instant) {
        self.window.push_back(now);
        self.daily_count = self.daily_count.saturating_add(1);
    }

    fn reset_day(&mut self, now: Instant) {
        self.daily_count = 0;
        self.day_start = now;
    }

    /// Prune, then sleep until the window has room for one more call.
    /// Returns the seconds slept.
    async fn wait_for_slot(&mut self, rpm: u32) -> f64 {
        let now = Instant::now();
        self.prune(now);
        if self.window.len() < rpm as usize {
            return 0.0;
        }
        let oldest = self.window.front().copied().unwrap_or(now);
        let wait =
            WINDOW.as_secs_f64() - now.duration_since(oldest).as_secs_f64() + WINDOW_SLACK_SECS;
        if wait <= 0.0 {
            return 0.0;
        }
        tracing::debug!(rpm, waited_secs = wait, "minute quota exhausted");
        sleep(Duration::from_secs_f64(wait)).await;
        self.prune(Instant::now());
        wait
    }
}

impl RateLimiter {
    pub fn new(rpm: u32, rpd: u32) -> Self {
        Self {
            rpm,
            rpd,
            state: Mutex::new(RateWindow {
                window: VecDeque::with_capacity(rpm.min(1024) as usize),
                daily_count: 0,
                day_start: Instant::now(),
            }),
        }
    }

    pub fn rpm(&self) -> u32 {
        self.rpm
    }

    pub fn rpd(&self) -> u32 {
        self.rpd
    }

    /// Block until a request is allowed. Returns the seconds slept (0 when admitted at once).
    pub async fn wait_if_needed(&self) -> f64 {
        let mut st = self.state.lock().await;
        let now = Instant::now();

        // 1) day rollover
        if now.duration_since(st.day_start) > DAY {
            st.reset_day(now);
        }

        // 2) daily budget spent: sleep out the rest of the day. The call
        //    still takes a window slot; the fresh day's counter stays at 0.
        if st.daily_count >= self.rpd {
            let elapsed = now.duration_since(st.day_start).as_secs_f64();
            let wait = DAY.as_secs_f64() - elapsed + DAY_SLACK_SECS;
            tracing::debug!(rpd = self.rpd, waited_secs = wait, "daily quota exhausted");
            sleep(Duration::from_secs_f64(wait.max(0.0))).await;
            st.reset_day(Instant::now());
            let waited = wait.max(0.0) + st.wait_for_slot(self.rpm).await;
            st.window.push_back(Instant::now());
            histogram!(RATE_LIMIT_WAIT).record(waited);
            return waited;
        }

        // 3) + 4) slide the minute window, waiting for the oldest admission
        //    to expire when it is full
        let waited = st.wait_for_slot(self.rpm).await;
        if waited > 0.0 {
            histogram!(RATE_LIMIT_WAIT).record(waited);
        }

        // 5) admit
        st.admit(Instant::now());
        waited
    }

    /// Requests admitted since the current day started.
    pub async fn daily_count(&self) -> u32 {
        self.state.lock().await.daily_count
    }

    /// Admissions currently inside the 60s window.
    pub async fn window_len(&self) -> usize {
        let mut st = self.state.lock().await;
        st.prune(Instant::now());
        st.window.len()
    }
}
