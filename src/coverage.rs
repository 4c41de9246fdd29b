//! # Coverage and confidence scoring
//! Pure scoring over a fact set and a list of required categories. No I/O.
//!
//! - `data_quality` = `0.7 * coverage + 0.3 * volume`, where coverage is
//!   the share of required categories with at least one matching fact
//!   and volume saturates at 50 facts. With nothing required the score is
//!   a flat 0.8, whatever the volume.
//! - `analysis_confidence` blends data quality, a step-function proxy for
//!   cross-analysis agreement, and citation compliance (40/30/30).
//!
//! Category matching is pluggable through [`CategoryMatcher`]. The default
//! [`SubstringMatcher`] trusts explicit category tags when a fact has them
//! and otherwise falls back to case-insensitive substring matching over the
//! fact's text fields, which can both over- and under-match.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ingest::types::Fact;

/// Facts needed for full volume credit.
pub const VOLUME_FULL: usize = 50;
/// Coverage (and data quality) assumed when no categories are required.
pub const DEFAULT_COVERAGE: f64 = 0.8;

const W_COVERAGE: f64 = 0.7;
const W_VOLUME: f64 = 0.3;

const W_DATA_QUALITY: f64 = 0.40;
const W_AGREEMENT: f64 = 0.30;
const W_CITATIONS: f64 = 0.30;

/// Decides whether a fact belongs to a category.
pub trait CategoryMatcher: Send + Sync {
    fn matches(&self, fact: &Fact, category: &str) -> bool;
}

/// Tag equality for tagged facts; substring match on metric/entity and
/// unit equality for untagged ones. Case-insensitive throughout.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringMatcher;

impl CategoryMatcher for SubstringMatcher {
    fn matches(&self, fact: &Fact, category: &str) -> bool {
        let c = category.trim().to_lowercase();
        if c.is_empty() {
            return false;
        }

        if !fact.categories().is_empty() {
            return fact
                .categories()
                .iter()
                .any(|t| t.trim().eq_ignore_ascii_case(&c));
        }

        fact.metric().to_lowercase().contains(&c)
            || fact
                .entity()
                .is_some_and(|e| e.to_lowercase().contains(&c))
            || fact.unit().is_some_and(|u| u.trim().eq_ignore_ascii_case(&c))
    }
}

/// Required categories with duplicates removed, first occurrence wins.
fn distinct(required: &[String]) -> Vec<&String> {
    let mut seen = HashSet::new();
    required
        .iter()
        .filter(|c| seen.insert(c.trim().to_lowercase()))
        .collect()
}

/// Computes data quality and composite analysis confidence.
#[derive(Clone)]
pub struct CoverageScorer {
    matcher: Arc<dyn CategoryMatcher>,
}

impl Default for CoverageScorer {
    fn default() -> Self {
        Self::new(Arc::new(SubstringMatcher))
    }
}

impl std::fmt::Debug for CoverageScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoverageScorer").finish_non_exhaustive()
    }
}

impl CoverageScorer {
    pub fn new(matcher: Arc<dyn CategoryMatcher>) -> Self {
        Self { matcher }
    }

    pub fn matcher(&self) -> &Arc<dyn CategoryMatcher> {
        &self.matcher
    }

    /// Share of required categories with at least one fact; `DEFAULT_COVERAGE` if none required.
    pub fn coverage(&self, facts: &[Fact], required: &[String]) -> f64 {
        let req = distinct(required);
        if req.is_empty() {
            return DEFAULT_COVERAGE;
        }
        let covered = req
            .iter()
            .filter(|c| facts.iter().any(|f| self.matcher.matches(f, c)))
            .count();
        covered as f64 / req.len() as f64
    }

    /// `min(len / VOLUME_FULL, 1)`.
    pub fn volume(&self, facts: &[Fact]) -> f64 {
        (facts.len() as f64 / VOLUME_FULL as f64).min(1.0)
    }

    pub fn data_quality(&self, facts: &[Fact], required: &[String]) -> f64 {
        if distinct(required).is_empty() {
            return DEFAULT_COVERAGE;
        }
        W_COVERAGE * self.coverage(facts, required) + W_VOLUME * self.volume(facts)
    }

    pub fn analysis_confidence(
        &self,
        facts: &[Fact],
        required: &[String],
        independent_analysis_count: u32,
        citation_violations: u32,
    ) -> AnalysisConfidence {
        let data_quality = self.data_quality(facts, required);
        let agreement = agreement_proxy(independent_analysis_count);
        let citation_compliance =
            citation_compliance(independent_analysis_count, citation_violations);

        let overall = data_quality * W_DATA_QUALITY
            + agreement * W_AGREEMENT
            + citation_compliance * W_CITATIONS;

        AnalysisConfidence {
            overall,
            components: ConfidenceComponents {
                data_quality,
                agreement,
                citation_compliance,
            },
            recommendation: Recommendation::from_score(overall),
        }
    }
}

/// Reports required categories without any matching fact.
#[derive(Clone)]
pub struct GapAnalyzer {
    matcher: Arc<dyn CategoryMatcher>,
}

impl Default for GapAnalyzer {
    fn default() -> Self {
        Self::new(Arc::new(SubstringMatcher))
    }
}

impl std::fmt::Debug for GapAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GapAnalyzer").finish_non_exhaustive()
    }
}

impl GapAnalyzer {
    pub fn new(matcher: Arc<dyn CategoryMatcher>) -> Self {
        Self { matcher }
    }

    /// Missing categories, in the order they were required.
    pub fn missing(&self, facts: &[Fact], required: &[String]) -> Vec<String> {
        distinct(required)
            .into_iter()
            .filter(|c| !facts.iter().any(|f| self.matcher.matches(f, c)))
            .cloned()
            .collect()
    }
}

/// Coarse stand-in for semantic agreement between independent analyses.
/// Replace with a real agreement measure when one exists.
pub fn agreement_proxy(independent_analysis_count: u32) -> f64 {
    match independent_analysis_count {
        0..=1 => 0.7,
        2..=3 => 0.75,
        4..=5 => 0.85,
        _ => 0.9,
    }
}

/// `max(0, 1 - violations / max(2 * analyses, 1))`.
pub fn citation_compliance(independent_analysis_count: u32, citation_violations: u32) -> f64 {
    let denom = (2 * u64::from(independent_analysis_count)).max(1) as f64;
    (1.0 - f64::from(citation_violations) / denom).max(0.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Recommendation {
    High,
    MediumHigh,
    Medium,
    Low,
}

impl Recommendation {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.85 {
            Recommendation::High
        } else if score >= 0.70 {
            Recommendation::MediumHigh
        } else if score >= 0.55 {
            Recommendation::Medium
        } else {
            Recommendation::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceComponents {
    pub data_quality: f64,
    pub agreement: f64,
    pub citation_compliance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisConfidence {
    pub overall: f64,
    pub components: ConfidenceComponents,
    pub recommendation: Recommendation,
}
