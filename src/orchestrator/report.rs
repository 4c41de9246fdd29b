// src/orchestrator/report.rs
//! Per-run summary handed to downstream consumers.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub source: String,
    pub reason: String,
}

/// `sources_failed` lists sources that could not run; `sources_empty` lists
/// sources that ran but produced nothing (including undecodable payloads).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionReport {
    pub sources_queried: Vec<String>,
    pub sources_failed: Vec<SourceFailure>,
    pub total_facts: usize,
    pub unique_facts: usize,
    pub coverage_score: f64,
    pub gaps_identified: Vec<String>,
    #[serde(default)]
    pub sources_empty: Vec<String>,
    #[serde(default)]
    pub targeted_pass: bool,
    #[serde(default)]
    pub categories: BTreeSet<String>,
    #[serde(default)]
    pub duration_ms: u64,
}

impl ExtractionReport {
    pub fn failed(&self, source: &str) -> bool {
        self.sources_failed.iter().any(|f| f.source == source)
    }

    /// Add a failure unless this source already has one. A failure replaces
    /// an earlier empty result.
    pub(crate) fn record_failure(&mut self, source: &str, reason: String) {
        self.sources_empty.retain(|s| s != source);
        if !self.failed(source) {
            self.sources_failed.push(SourceFailure {
                source: source.to_string(),
                reason,
            });
        }
    }

    pub(crate) fn record_queried(&mut self, source: &str) {
        if !self.sources_queried.iter().any(|s| s == source) {
            self.sources_queried.push(source.to_string());
        }
    }

    /// The source ran and returned nothing; it no longer counts as failed.
    pub(crate) fn record_empty(&mut self, source: &str) {
        self.sources_failed.retain(|f| f.source != source);
        if !self.sources_empty.iter().any(|s| s == source) {
            self.sources_empty.push(source.to_string());
        }
    }

    /// The source returned facts, so it is neither failed nor empty.
    pub(crate) fn record_productive(&mut self, source: &str) {
        self.sources_failed.retain(|f| f.source != source);
        self.sources_empty.retain(|s| s != source);
    }

    /// Short plain-text rendering for logs and the CLI.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "sources: {} queried, {} failed, {} empty",
            self.sources_queried.len(),
            self.sources_failed.len(),
            self.sources_empty.len()
        );
        let _ = writeln!(
            out,
            "facts: {} unique of {} fetched",
            self.unique_facts, self.total_facts
        );
        let _ = writeln!(out, "coverage: {:.2}", self.coverage_score);
        if !self.gaps_identified.is_empty() {
            let _ = writeln!(out, "gaps: {}", self.gaps_identified.join(", "));
        }
        if self.targeted_pass {
            let _ = writeln!(out, "targeted pass: yes");
        }
        for f in &self.sources_failed {
            let _ = writeln!(out, "  failed {}: {}", f.source, f.reason);
        }
        let _ = write!(out, "took {} ms", self.duration_ms);
        out
    }
}
