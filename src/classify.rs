// src/classify.rs
//! Coarse query classification: which categories/entities a free-text query touches.
//!
//! Keyword tables are plain data (`category -> [keyword, ...]`), loaded from the
//! `[classifier]` config section or the built-in seed. Each keyword compiles to a
//! case-insensitive, word-bounded regex once; `classify()` only runs matches.
//!
//! The output feeds `FetchParams::categories` so connectors can narrow their
//! requests; it never decides which sources run.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Keyword tables as configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "ClassifierConfig::default_tables")]
    pub tables: BTreeMap<String, Vec<String>>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            tables: Self::default_tables(),
        }
    }
}

impl ClassifierConfig {
    /// Built-in seed for common socio-economic domains.
    pub fn default_tables() -> BTreeMap<String, Vec<String>> {
        let seed: &[(&str, &[&str])] = &[
            (
                "labor",
                &["employment", "unemployment", "jobs", "labor", "labour", "workforce", "payroll"],
            ),
            ("wages", &["wage", "wages", "salary", "salaries", "earnings", "income", "pay"]),
            ("housing", &["housing", "rent", "home prices", "mortgage", "construction"]),
            ("inflation", &["inflation", "cpi", "prices", "cost of living"]),
            ("gdp", &["gdp", "output", "growth", "economy", "economic"]),
            ("population", &["population", "demographic", "demographics", "migration", "census"]),
            ("education", &["education", "school", "schools", "university", "graduation"]),
            ("health", &["health", "hospital", "insurance", "mortality"]),
        ];
        seed.iter()
            .map(|(cat, kws)| {
                (
                    cat.to_string(),
                    kws.iter().map(|k| k.to_string()).collect(),
                )
            })
            .collect()
    }
}

#[derive(Debug)]
struct CompiledCategory {
    name: String,
    patterns: Vec<Regex>,
}

/// Compiled keyword matcher over a query string.
#[derive(Debug)]
pub struct QueryClassifier {
    categories: Vec<CompiledCategory>,
}

impl Default for QueryClassifier {
    fn default() -> Self {
        // The seed only contains escaped literals, so compilation cannot fail;
        // fall back to an empty classifier rather than panic if it ever does.
        Self::from_config(&ClassifierConfig::default()).unwrap_or(Self {
            categories: Vec::new(),
        })
    }
}

impl QueryClassifier {
    pub fn from_config(cfg: &ClassifierConfig) -> Result<Self> {
        let mut categories = Vec::with_capacity(cfg.tables.len());
        for (name, keywords) in &cfg.tables {
            let name = name.trim().to_lowercase();
            if name.is_empty() {
                continue;
            }
            let mut patterns = Vec::with_capacity(keywords.len());
            for kw in keywords {
                let kw = kw.trim();
                if kw.is_empty() {
                    continue;
                }
                let re = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(kw)))
                    .with_context(|| format!("classifier keyword {kw:?} in {name}"))?;
                patterns.push(re);
            }
            categories.push(CompiledCategory { name, patterns });
        }
        Ok(Self { categories })
    }

    /// Categories whose keywords (or own name) occur in `query`.
    pub fn classify(&self, query: &str) -> BTreeSet<String> {
        let lowered = query.to_lowercase();
        self.categories
            .iter()
            .filter(|c| {
                c.patterns.iter().any(|re| re.is_match(query)) || contains_word(&lowered, &c.name)
            })
            .map(|c| c.name.clone())
            .collect()
    }
}

fn contains_word(haystack: &str, word: &str) -> bool {
    haystack
        .split(|c: char| !c.is_alphanumeric())
        .any(|tok| tok == word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_picks_up_keywords() {
        let c = QueryClassifier::default();
        let out = c.classify("Unemployment and median wages in Ohio since 2019");
        assert!(out.contains("labor"));
        assert!(out.contains("wages"));
        assert!(!out.contains("housing"));
    }

    #[test]
    fn word_boundaries_hold() {
        let c = QueryClassifier::default();
        // "payment" must not trip "pay"
        assert!(!c.classify("payment systems").contains("wages"));
    }

    #[test]
    fn custom_tables_replace_seed() {
        let mut tables = BTreeMap::new();
        tables.insert("Energy".to_string(), vec!["oil".into(), "natural gas".into()]);
        let c = QueryClassifier::from_config(&ClassifierConfig { tables }).unwrap();
        let out = c.classify("Natural Gas output in Texas");
        assert_eq!(out, BTreeSet::from(["energy".to_string()]));
        assert!(c.classify("energy policy").contains("energy"));
        assert!(c.classify("jobs report").is_empty());
    }

    #[test]
    fn empty_query_yields_nothing() {
        assert!(QueryClassifier::default().classify("").is_empty());
    }
}
