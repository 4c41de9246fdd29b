//! # Source Weights
//!
//! Default provenance for sources that do not set their own:
//! a dedup `priority` (higher wins a conflict) and a per-fact `confidence`
//! in `[0.0, 1.0]`.
//!
//! - Case-insensitive lookup with normalization of punctuation, dashes, etc.
//! - Aliases map alternative spellings to canonical names.
//! - Fallback order: aliases → exact match → substring match → default.
//! - `default_seed()` covers common statistical and research sources.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceWeight {
    pub priority: u32,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceWeights {
    #[serde(default = "default_weight")]
    pub default: SourceWeight,
    /// Canonical source name → weight.
    #[serde(default)]
    pub sources: HashMap<String, SourceWeight>,
    /// Non-canonical name → canonical name.
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

fn default_weight() -> SourceWeight {
    SourceWeight {
        priority: 50,
        confidence: 0.60,
    }
}

impl Default for SourceWeights {
    fn default() -> Self {
        Self::default_seed()
    }
}

impl SourceWeights {
    /// Load from a JSON file; falls back to `default_seed()` on any error.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(path.as_ref()) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                tracing::warn!(
                    path = %path.as_ref().display(),
                    error = %e,
                    "bad source weights; using seed"
                );
                Self::default_seed()
            }),
            Err(_) => Self::default_seed(),
        }
    }

    pub fn weight_for(&self, source: &str) -> SourceWeight {
        let s = normalize(source);

        // 1) alias
        if let Some(canon) = self.aliases.get(&s) {
            if let Some(&w) = self.sources.get(&normalize(canon)) {
                return clamp(w);
            }
        }

        // 2) exact
        if let Some(&w) = self.sources.get(&s) {
            return clamp(w);
        }

        // 3) substring: longest key wins so "bls" does not shadow "bls regional"
        let mut best: Option<(&String, &SourceWeight)> = None;
        for (k, w) in &self.sources {
            let longer = best.map_or(true, |(bk, _)| k.len() > bk.len());
            if !k.is_empty() && s.contains(k.as_str()) && longer {
                best = Some((k, w));
            }
        }
        if let Some((_, &w)) = best {
            return clamp(w);
        }

        // 4) default
        clamp(self.default)
    }

    pub fn priority_for(&self, source: &str) -> u32 {
        self.weight_for(source).priority
    }

    pub fn confidence_for(&self, source: &str) -> f64 {
        self.weight_for(source).confidence
    }

    /// Built-in seed: official statistics first, then international bodies,
    /// private/academic data, and web research last.
    pub fn default_seed() -> Self {
        let mut sources = HashMap::new();
        let mut aliases = HashMap::new();

        for (k, p, c) in [
            ("cache", 98, 0.95),
            ("census", 95, 0.95),
            ("bls", 95, 0.95),
            ("bea", 93, 0.93),
            ("fred", 92, 0.92),
            ("eurostat", 90, 0.90),
            ("oecd", 88, 0.90),
            ("world bank", 88, 0.88),
            ("imf", 88, 0.88),
            ("adp", 80, 0.80),
            ("state agency", 78, 0.80),
            ("academic", 75, 0.78),
            ("news", 60, 0.65),
            ("web", 55, 0.60),
        ] {
            sources.insert(k.to_string(), SourceWeight { priority: p, confidence: c });
        }

        for (a, c) in [
            ("bureau of labor statistics", "bls"),
            ("us census bureau", "census"),
            ("census bureau", "census"),
            ("acs", "census"),
            ("bureau of economic analysis", "bea"),
            ("federal reserve economic data", "fred"),
            ("st louis fed", "fred"),
            ("worldbank", "world bank"),
            ("wb", "world bank"),
            ("international monetary fund", "imf"),
            ("adp research", "adp"),
            ("scholar", "academic"),
            ("journal", "academic"),
            ("web search", "web"),
            ("research", "web"),
        ] {
            aliases.insert(a.to_string(), c.to_string());
        }

        Self {
            default: default_weight(),
            sources,
            aliases,
        }
    }
}

/// Lowercase, separators and punctuation to spaces, collapse whitespace.
pub fn normalize(s: &str) -> String {
    let mut out = s.trim().to_ascii_lowercase();
    for ch in ['—', '–', '-', '_', '/', '\\'] {
        out = out.replace(ch, " ");
    }
    out = out.replace(['\n', '\r', '\t', '.', ',', '’', '\''], " ");
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clamp(w: SourceWeight) -> SourceWeight {
    SourceWeight {
        priority: w.priority,
        confidence: if w.confidence.is_nan() {
            0.0
        } else {
            w.confidence.clamp(0.0, 1.0)
        },
    }
}
