//! Prometheus recorder and metric descriptions.
//!
//! Library code only emits through the `metrics` facade; nothing is recorded
//! unless a binary installs a recorder with [`install_prometheus`].

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub const FACTS_FETCHED: &str = "aggregator_facts_fetched_total";
pub const SOURCE_FAILURES: &str = "aggregator_source_failures_total";
pub const PARSE_ERRORS: &str = "aggregator_parse_errors_total";
pub const DEDUP_DROPPED: &str = "aggregator_dedup_dropped_total";
pub const RATE_LIMIT_WAIT: &str = "aggregator_rate_limit_wait_seconds";
pub const RUNS: &str = "aggregator_runs_total";
pub const COVERAGE_SCORE: &str = "aggregator_coverage_score";

pub struct Metrics {
    pub handle: PrometheusHandle,
}

static INSTALLED: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the global Prometheus recorder once; later calls return the same handle.
pub fn install_prometheus() -> Result<Metrics> {
    let handle = INSTALLED.get_or_try_init(|| {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe_all();
        Ok::<_, anyhow::Error>(handle)
    })?;
    Ok(Metrics {
        handle: handle.clone(),
    })
}

impl Metrics {
    /// Prometheus exposition text.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

fn describe_all() {
    describe_counter!(FACTS_FETCHED, Unit::Count, "Facts returned by connectors, per source");
    describe_counter!(SOURCE_FAILURES, Unit::Count, "Source calls that failed after retries");
    describe_counter!(PARSE_ERRORS, Unit::Count, "Responses that could not be decoded");
    describe_counter!(DEDUP_DROPPED, Unit::Count, "Facts discarded as duplicates");
    describe_histogram!(RATE_LIMIT_WAIT, Unit::Seconds, "Time spent waiting on rate limiters");
    describe_counter!(RUNS, Unit::Count, "Extraction runs started");
    describe_gauge!(COVERAGE_SCORE, "Data quality score of the last run");
}
