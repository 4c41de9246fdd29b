// src/ingest/mod.rs
//! Fact ingestion primitives: the fact model, connector contract, dedup,
//! checkpoints and configuration.

pub mod checkpoint;
pub mod config;
pub mod connectors;
pub mod dedup;
pub mod types;

use once_cell::sync::OnceCell;
use regex::Regex;

pub use crate::ingest::dedup::Deduplicator;
pub use crate::ingest::types::{
    Fact, FactKey, FactSet, FactValue, FetchParams, RawFact, SourceConnector,
};

/// Normalize a metric name: strip stray control characters, collapse whitespace, trim.
/// Case is preserved; identity comparison is exact.
pub fn normalize_metric(s: &str) -> String {
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("static regex"));

    let cleaned: String = s.chars().filter(|c| !c.is_control() || c.is_whitespace()).collect();
    re_ws.replace_all(&cleaned, " ").trim().to_string()
}
