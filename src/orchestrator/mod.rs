// src/orchestrator/mod.rs
//! # Extraction Orchestrator
//! Runs a query across every configured source and returns a deduplicated,
//! scored fact set plus a report.
//!
//! Flow: `Idle → Running(tier 1..N) → Aggregating → Scoring → [GapFill] → Done`.
//! Tiers run strictly in sequence; members of one tier run concurrently up to
//! `max_concurrency`. No connector error ever leaves `extract`: each one is
//! classified and recorded per source. Only malformed configuration fails,
//! and only at construction time.

pub mod gap_fill;
pub mod report;
pub mod source;

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use metrics::{counter, gauge};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::classify::{ClassifierConfig, QueryClassifier};
use crate::coverage::{CategoryMatcher, CoverageScorer, GapAnalyzer, SubstringMatcher};
use crate::error::{OrchestratorError, SourceError};
use crate::ingest::config::{AggregatorConfig, GapFillConfig};
use crate::ingest::types::{Fact, FactSet, FetchParams, RawFact};
use crate::ingest::{connectors, Deduplicator};
use crate::metrics::{COVERAGE_SCORE, FACTS_FETCHED, PARSE_ERRORS, RUNS, SOURCE_FAILURES};

pub use gap_fill::{GapStrategies, GapTarget};
pub use report::{ExtractionReport, SourceFailure};
pub use source::{call_isolated, RetryPolicy, SourceDescriptor};

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ExtractionPhase {
    Idle,
    Running { tier: u32 },
    Aggregating,
    Scoring,
    GapFill,
    Done,
}

/// Everything except the sources.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub retry: RetryPolicy,
    pub max_concurrency: usize,
    /// Whole-run budget; calls still in flight when it expires fail as `cancelled`.
    pub deadline: Option<Duration>,
    pub gap_fill: GapFillConfig,
    pub classifier: ClassifierConfig,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            max_concurrency: 8,
            deadline: None,
            gap_fill: GapFillConfig::default(),
            classifier: ClassifierConfig::default(),
        }
    }
}

impl From<&AggregatorConfig> for OrchestratorSettings {
    fn from(cfg: &AggregatorConfig) -> Self {
        Self {
            retry: RetryPolicy::from(&cfg.retry),
            max_concurrency: cfg.run.max_concurrency,
            deadline: cfg.run.deadline_secs.map(source::secs),
            gap_fill: cfg.gap_fill.clone(),
            classifier: cfg.classifier.clone(),
        }
    }
}

pub struct Orchestrator {
    /// Sorted by tier; configuration order within a tier.
    sources: Vec<SourceDescriptor>,
    settings: OrchestratorSettings,
    strategies: GapStrategies,
    classifier: QueryClassifier,
    scorer: CoverageScorer,
    gaps: GapAnalyzer,
    dedup: Deduplicator,
    phase: Mutex<ExtractionPhase>,
}

/// Per-tier outcome of one source call, in the shape the run loop folds in.
struct CallResult {
    idx: usize,
    outcome: Result<Vec<RawFact>, SourceError>,
}

impl Orchestrator {
    pub fn new(
        sources: Vec<SourceDescriptor>,
        settings: OrchestratorSettings,
    ) -> Result<Self, OrchestratorError> {
        if sources.is_empty() {
            return Err(OrchestratorError::NoSources);
        }
        if settings.max_concurrency == 0 {
            return Err(OrchestratorError::ZeroConcurrency);
        }

        let mut seen = HashSet::new();
        for d in &sources {
            let name = d.name().trim();
            if name.is_empty() {
                return Err(OrchestratorError::EmptySourceName);
            }
            if !seen.insert(name.to_lowercase()) {
                return Err(OrchestratorError::DuplicateSource(name.to_string()));
            }
            if !(0.0..=1.0).contains(&d.confidence()) {
                return Err(OrchestratorError::InvalidConfidence {
                    name: name.to_string(),
                    value: d.confidence().to_string(),
                });
            }
        }
        for s in &settings.gap_fill.strategies {
            if !seen.contains(&s.source.trim().to_lowercase()) {
                return Err(OrchestratorError::UnknownStrategySource {
                    category: s.category.clone(),
                    name: s.source.clone(),
                });
            }
        }

        let mut sources = sources;
        sources.sort_by_key(|d| d.tier());

        let classifier = QueryClassifier::from_config(&settings.classifier).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "classifier tables rejected; using built-in seed");
            QueryClassifier::default()
        });
        let strategies = GapStrategies::new(&settings.gap_fill.strategies);
        let matcher: Arc<dyn CategoryMatcher> = Arc::new(SubstringMatcher);

        Ok(Self {
            sources,
            settings,
            strategies,
            classifier,
            scorer: CoverageScorer::new(matcher.clone()),
            gaps: GapAnalyzer::new(matcher),
            dedup: Deduplicator::new(),
            phase: Mutex::new(ExtractionPhase::Idle),
        })
    }

    /// Build sources and connectors from a loaded config.
    pub fn from_config(cfg: &AggregatorConfig) -> Result<Self> {
        let weights = cfg.source_weights();
        let mut sources = Vec::with_capacity(cfg.sources.len());
        for sc in &cfg.sources {
            let conn = connectors::build(sc)
                .with_context(|| format!("building connector for source {}", sc.name))?;
            sources.push(SourceDescriptor::from_config(sc, &weights, conn));
        }
        Ok(Self::new(sources, OrchestratorSettings::from(cfg))?)
    }

    /// Swap the category predicate used for coverage and gap detection.
    pub fn with_matcher(mut self, matcher: Arc<dyn CategoryMatcher>) -> Self {
        self.scorer = CoverageScorer::new(matcher.clone());
        self.gaps = GapAnalyzer::new(matcher);
        self
    }

    pub fn sources(&self) -> &[SourceDescriptor] {
        &self.sources
    }

    pub fn scorer(&self) -> &CoverageScorer {
        &self.scorer
    }

    pub fn phase(&self) -> ExtractionPhase {
        *self.phase.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_phase(&self, phase: ExtractionPhase) {
        tracing::info!(?phase, "extraction phase");
        *self.phase.lock().unwrap_or_else(|p| p.into_inner()) = phase;
    }

    pub async fn extract(
        &self,
        query: &str,
        required: &[String],
        min_facts: Option<usize>,
    ) -> (FactSet, ExtractionReport) {
        self.extract_with_cancel(query, required, min_facts, CancellationToken::new())
            .await
    }

    /// As [`extract`](Self::extract), stopping in-flight calls when `cancel`
    /// fires or the configured deadline passes. Whatever was gathered is
    /// still merged, scored and returned.
    pub async fn extract_with_cancel(
        &self,
        query: &str,
        required: &[String],
        min_facts: Option<usize>,
        cancel: CancellationToken,
    ) -> (FactSet, ExtractionReport) {
        let started = tokio::time::Instant::now();
        counter!(RUNS).increment(1);

        let cancel = cancel.child_token();
        let deadline_task = self.settings.deadline.map(|d| {
            let tok = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(d).await;
                tracing::warn!(deadline_secs = d.as_secs_f64(), "run deadline reached; cancelling");
                tok.cancel();
            })
        });

        let categories = self.classifier.classify(query);
        let params = FetchParams {
            query: query.to_string(),
            categories: categories.clone(),
            focus_category: None,
        };
        let mut report = ExtractionReport {
            categories,
            ..ExtractionReport::default()
        };
        let mut raw: Vec<Fact> = Vec::new();

        // RUNNING: tiers in order
        let mut tiers: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for (i, d) in self.sources.iter().enumerate() {
            tiers.entry(d.tier()).or_default().push(i);
        }
        for (tier, members) in &tiers {
            self.set_phase(ExtractionPhase::Running { tier: *tier });
            let calls: Vec<(usize, FetchParams)> =
                members.iter().map(|&i| (i, params.clone())).collect();
            let results = self.run_calls(calls, &cancel).await;
            for r in results {
                self.absorb(r, &mut raw, &mut report);
            }
        }

        // AGGREGATING
        self.set_phase(ExtractionPhase::Aggregating);
        let mut merged = self.dedup.merge(&raw);

        // SCORING
        self.set_phase(ExtractionPhase::Scoring);
        let mut score = self.scorer.data_quality(&merged, required);
        let mut gaps = self.gaps.missing(&merged, required);

        // GAP_FILL: at most one targeted pass
        let min_facts = min_facts.unwrap_or(self.settings.gap_fill.min_facts);
        if gap_fill::should_run(&self.settings.gap_fill, &gaps, merged.len(), min_facts)
            && !cancel.is_cancelled()
        {
            self.set_phase(ExtractionPhase::GapFill);
            let plan = self.strategies.plan(&gaps, query, &self.sources);
            tracing::info!(gaps = ?gaps, targets = plan.len(), "targeted gap-fill pass");
            let calls: Vec<(usize, FetchParams)> = plan
                .into_iter()
                .map(|t| {
                    (
                        t.source_idx,
                        FetchParams {
                            query: t.query,
                            categories: params.categories.clone(),
                            focus_category: Some(t.category),
                        },
                    )
                })
                .collect();
            report.targeted_pass = !calls.is_empty();
            let results = self.run_calls(calls, &cancel).await;
            for r in results {
                self.absorb(r, &mut raw, &mut report);
            }

            merged = self.dedup.merge(&raw);
            score = self.scorer.data_quality(&merged, required);
            gaps = self.gaps.missing(&merged, required);
        }

        if let Some(h) = deadline_task {
            h.abort();
        }

        report.total_facts = raw.len();
        report.unique_facts = merged.len();
        report.coverage_score = score;
        report.gaps_identified = gaps;
        report.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        gauge!(COVERAGE_SCORE).set(score);

        self.set_phase(ExtractionPhase::Done);
        tracing::info!(
            total = report.total_facts,
            unique = report.unique_facts,
            failed = report.sources_failed.len(),
            coverage = report.coverage_score,
            "extraction finished"
        );
        (FactSet::new(merged), report)
    }

    /// Bounded fan-out; results come back in call order regardless of completion order.
    async fn run_calls(
        &self,
        calls: Vec<(usize, FetchParams)>,
        cancel: &CancellationToken,
    ) -> Vec<CallResult> {
        let policy = &self.settings.retry;
        let mut results: Vec<(usize, CallResult)> = stream::iter(calls.into_iter().enumerate())
            .map(|(order, (idx, p))| async move {
                let outcome = call_isolated(&self.sources[idx], &p, policy, cancel).await;
                (order, CallResult { idx, outcome })
            })
            .buffer_unordered(self.settings.max_concurrency)
            .collect()
            .await;
        results.sort_by_key(|(order, _)| *order);
        results.into_iter().map(|(_, r)| r).collect()
    }

    /// Fold one call outcome into the raw fact list and the report.
    fn absorb(&self, r: CallResult, raw: &mut Vec<Fact>, report: &mut ExtractionReport) {
        let d = &self.sources[r.idx];
        report.record_queried(d.name());

        // Facts from an earlier pass outrank any later failure or empty result.
        let produced = raw.iter().any(|f| f.source() == d.name());

        match r.outcome {
            Ok(facts) => {
                counter!(FACTS_FETCHED, "source" => d.name().to_string())
                    .increment(facts.len() as u64);
                if !facts.is_empty() {
                    report.record_productive(d.name());
                } else if !produced {
                    report.record_empty(d.name());
                }
                let now = Utc::now();
                raw.extend(
                    facts
                        .into_iter()
                        .map(|f| Fact::from_raw(f, d.name(), d.priority(), d.confidence(), now)),
                );
            }
            Err(e) if !e.counts_as_failure() => {
                tracing::warn!(
                    source = %d.name(),
                    error = %e,
                    "unparseable response; treating as zero facts"
                );
                counter!(PARSE_ERRORS, "source" => d.name().to_string()).increment(1);
                if !produced {
                    report.record_empty(d.name());
                }
            }
            Err(e) => {
                tracing::warn!(source = %d.name(), tier = d.tier(), error = %e, "source failed");
                counter!(SOURCE_FAILURES, "source" => d.name().to_string())
                    .increment(1);
                if !produced {
                    report.record_failure(d.name(), e.to_string());
                }
            }
        }
    }
}
