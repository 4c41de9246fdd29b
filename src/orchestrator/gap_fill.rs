// src/orchestrator/gap_fill.rs
//! Targeted second pass: one call per missing category, aimed at the source
//! the strategy table names for it.
//!
//! Categories without a configured strategy go to the highest-priority
//! source (lowest tier, then configuration order break ties) with the
//! default `"{category} {query}"` template.

use std::collections::HashMap;

use crate::ingest::config::{GapFillConfig, GapStrategy};
use crate::orchestrator::source::SourceDescriptor;

/// One planned call of the targeted pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapTarget {
    pub category: String,
    /// Index into the orchestrator's source list.
    pub source_idx: usize,
    pub query: String,
}

/// Lookup table `category (lowercased) -> strategy`.
#[derive(Debug, Clone, Default)]
pub struct GapStrategies {
    by_category: HashMap<String, GapStrategy>,
}

impl GapStrategies {
    /// Later entries for the same category override earlier ones.
    pub fn new(strategies: &[GapStrategy]) -> Self {
        let by_category = strategies
            .iter()
            .map(|s| (s.category.trim().to_lowercase(), s.clone()))
            .collect();
        Self { by_category }
    }

    pub fn get(&self, category: &str) -> Option<&GapStrategy> {
        self.by_category.get(&category.trim().to_lowercase())
    }

    /// Deterministic plan: one target per gap, in gap order.
    pub fn plan(
        &self,
        gaps: &[String],
        query: &str,
        sources: &[SourceDescriptor],
    ) -> Vec<GapTarget> {
        let Some(fallback) = best_source(sources) else {
            return Vec::new();
        };

        gaps.iter()
            .filter_map(|cat| {
                let (idx, template) = match self.get(cat) {
                    Some(s) => {
                        let idx = sources
                            .iter()
                            .position(|d| d.name().eq_ignore_ascii_case(s.source.trim()));
                        match idx {
                            Some(i) => (i, s.query.as_str()),
                            None => {
                                tracing::warn!(
                                    category = %cat,
                                    source = %s.source,
                                    "gap strategy names unknown source; skipping"
                                );
                                return None;
                            }
                        }
                    }
                    None => (fallback, DEFAULT_TEMPLATE),
                };
                Some(GapTarget {
                    category: cat.clone(),
                    source_idx: idx,
                    query: render(template, query, cat),
                })
            })
            .collect()
    }
}

const DEFAULT_TEMPLATE: &str = "{category} {query}";

fn render(template: &str, query: &str, category: &str) -> String {
    template
        .replace("{query}", query)
        .replace("{category}", category)
        .trim()
        .to_string()
}

/// Highest priority; ties go to the lower tier, then the earlier entry.
fn best_source(sources: &[SourceDescriptor]) -> Option<usize> {
    sources
        .iter()
        .enumerate()
        .min_by(|(ia, a), (ib, b)| {
            b.priority()
                .cmp(&a.priority())
                .then(a.tier().cmp(&b.tier()))
                .then(ia.cmp(ib))
        })
        .map(|(i, _)| i)
}

/// Whether the targeted pass should run for this result.
pub fn should_run(
    cfg: &GapFillConfig,
    gaps: &[String],
    unique_facts: usize,
    min_facts: usize,
) -> bool {
    cfg.enabled && !gaps.is_empty() && unique_facts < min_facts
}
