// tests/common/mod.rs
#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fact_aggregator::orchestrator::RetryPolicy;
use fact_aggregator::{Backoff, FetchParams, RawFact, SourceConnector, SourceError};

/// Returns the same facts on every call and remembers what it was asked.
pub struct Fixed {
    pub name: String,
    pub facts: Vec<RawFact>,
    pub calls: AtomicU32,
    pub seen: Mutex<Vec<FetchParams>>,
}

impl Fixed {
    pub fn new(name: &str, facts: Vec<RawFact>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            facts,
            calls: AtomicU32::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait::async_trait]
impl SourceConnector for Fixed {
    async fn fetch(&self, params: &FetchParams) -> Result<Vec<RawFact>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(params.clone());
        Ok(self.facts.clone())
    }
    fn name(&self) -> &str {
        &self.name
    }
}

/// Fails every call with the same error.
pub struct Failing {
    pub name: String,
    pub error: SourceError,
    pub calls: AtomicU32,
}

impl Failing {
    pub fn new(name: &str, error: SourceError) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            error,
            calls: AtomicU32::new(0),
        })
    }
}

#[async_trait::async_trait]
impl SourceConnector for Failing {
    async fn fetch(&self, _params: &FetchParams) -> Result<Vec<RawFact>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
    fn name(&self) -> &str {
        &self.name
    }
}

/// Never answers within any sane timeout.
pub struct Hanging {
    pub calls: AtomicU32,
}

impl Hanging {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
        })
    }
}

#[async_trait::async_trait]
impl SourceConnector for Hanging {
    async fn fetch(&self, _params: &FetchParams) -> Result<Vec<RawFact>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
        Ok(Vec::new())
    }
    fn name(&self) -> &str {
        "hanging"
    }
}

/// Only answers on the targeted pass, with the facts for the focused category.
/// Either pass can be made to fail instead.
pub struct FocusOnly {
    pub facts: Vec<RawFact>,
    pub unfocused_error: Option<SourceError>,
    pub focused_error: Option<SourceError>,
    pub seen: Mutex<Vec<FetchParams>>,
}

impl FocusOnly {
    pub fn new(facts: Vec<RawFact>) -> Arc<Self> {
        Self::build(facts, None, None)
    }

    pub fn failing_unfocused(facts: Vec<RawFact>, error: SourceError) -> Arc<Self> {
        Self::build(facts, Some(error), None)
    }

    pub fn failing_focused(error: SourceError) -> Arc<Self> {
        Self::build(Vec::new(), None, Some(error))
    }

    fn build(
        facts: Vec<RawFact>,
        unfocused_error: Option<SourceError>,
        focused_error: Option<SourceError>,
    ) -> Arc<Self> {
        Arc::new(Self {
            facts,
            unfocused_error,
            focused_error,
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait::async_trait]
impl SourceConnector for FocusOnly {
    async fn fetch(&self, params: &FetchParams) -> Result<Vec<RawFact>, SourceError> {
        self.seen.lock().unwrap().push(params.clone());
        let error = match params.focus_category {
            Some(_) => &self.focused_error,
            None => &self.unfocused_error,
        };
        if let Some(e) = error {
            return Err(e.clone());
        }
        match &params.focus_category {
            Some(cat) => Ok(self
                .facts
                .iter()
                .filter(|f| f.categories.iter().any(|c| c == cat))
                .cloned()
                .collect()),
            None => Ok(Vec::new()),
        }
    }
    fn name(&self) -> &str {
        "focus-only"
    }
}

/// Small, fast retry policy for tests running on a paused clock.
pub fn quick_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        backoff: Backoff::new(0.5, 2.0, 4.0),
        rate_limited_wait: Duration::from_secs(1),
        call_timeout: Duration::from_secs(2),
    }
}

pub fn req(cats: &[&str]) -> Vec<String> {
    cats.iter().map(|s| s.to_string()).collect()
}
