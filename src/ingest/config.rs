// src/ingest/config.rs
//! Aggregator configuration: sources, retry policy, run limits, gap-fill
//! strategies, checkpoint dir and classifier tables.
//!
//! Resolution order for [`AggregatorConfig::load_default`]:
//! 1) `$AGGREGATOR_CONFIG_PATH` (must exist)
//! 2) `config/aggregator.toml`
//! 3) `config/aggregator.json`
//! 4) built-in defaults (no sources)

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::classify::ClassifierConfig;
use crate::source_weights::SourceWeights;
use crate::throttle::Backoff;

pub const ENV_PATH: &str = "AGGREGATOR_CONFIG_PATH";
const DEFAULT_TOML: &str = "config/aggregator.toml";
const DEFAULT_JSON: &str = "config/aggregator.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatorConfig {
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub gap_fill: GapFillConfig,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    /// Default priority/confidence table for sources that omit them.
    #[serde(default)]
    pub weights: SourceWeights,
    /// JSON weights table; replaces `weights` when set.
    #[serde(default)]
    pub weights_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base: f64,
    pub exp_base: f64,
    pub max_delay: f64,
    pub rate_limited_wait_secs: f64,
    pub call_timeout_secs: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base: 1.0,
            exp_base: 2.0,
            max_delay: 60.0,
            rate_limited_wait_secs: 30.0,
            call_timeout_secs: 30.0,
        }
    }
}

impl RetryConfig {
    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.base, self.exp_base, self.max_delay)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub max_concurrency: usize,
    pub deadline_secs: Option<f64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            deadline_secs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GapFillConfig {
    pub enabled: bool,
    pub min_facts: usize,
    pub strategies: Vec<GapStrategy>,
}

impl Default for GapFillConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_facts: 20,
            strategies: Vec::new(),
        }
    }
}

/// Which source to ask, and with what query, when `category` is missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapStrategy {
    pub category: String,
    pub source: String,
    /// Query template; `{query}` and `{category}` are substituted.
    #[serde(default = "default_strategy_query")]
    pub query: String,
}

fn default_strategy_query() -> String {
    "{category} {query}".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    pub dir: PathBuf,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("checkpoints"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorKind {
    #[default]
    Static,
    Http,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    #[serde(default = "default_tier")]
    pub tier: u32,
    #[serde(default = "default_rpm")]
    pub rpm: u32,
    #[serde(default = "default_rpd")]
    pub rpd: u32,
    #[serde(default)]
    pub priority: Option<u32>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub kind: ConnectorKind,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub fixture: Option<PathBuf>,
    #[serde(default)]
    pub api_key_env: Option<String>,
}

fn default_tier() -> u32 {
    1
}
fn default_rpm() -> u32 {
    60
}
fn default_rpd() -> u32 {
    10_000
}

impl AggregatorConfig {
    /// Weights from `weights_file` if configured, else the inline table.
    pub fn source_weights(&self) -> SourceWeights {
        match &self.weights_file {
            Some(p) => SourceWeights::load_from_file(p),
            None => self.weights.clone(),
        }
    }

    /// Load from an explicit path. Supports TOML or JSON (by extension, then by sniffing).
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading aggregator config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = parse(&content, &ext)
            .with_context(|| format!("parsing aggregator config {}", path.display()))?;
        Ok(cfg.sanitized())
    }

    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_PATH} points to non-existent path {}", pb.display()));
        }
        for p in [DEFAULT_TOML, DEFAULT_JSON] {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
        }
        tracing::debug!("no aggregator config found; using defaults");
        Ok(Self::default())
    }

    /// Clamp confidences and replace nonsensical retry values with defaults.
    pub fn sanitized(mut self) -> Self {
        let d = RetryConfig::default();
        let r = &mut self.retry;
        let bad = |x: f64| !x.is_finite() || x < 0.0;
        if bad(r.base) {
            r.base = d.base;
        }
        if bad(r.exp_base) {
            r.exp_base = d.exp_base;
        }
        if bad(r.max_delay) {
            r.max_delay = d.max_delay;
        }
        if bad(r.rate_limited_wait_secs) {
            r.rate_limited_wait_secs = d.rate_limited_wait_secs;
        }
        if bad(r.call_timeout_secs) || r.call_timeout_secs == 0.0 {
            r.call_timeout_secs = d.call_timeout_secs;
        }
        if let Some(dl) = self.run.deadline_secs {
            if bad(dl) {
                self.run.deadline_secs = None;
            }
        }
        for s in &mut self.sources {
            s.name = s.name.trim().to_string();
            if let Some(c) = s.confidence {
                s.confidence = Some(if c.is_nan() { 0.0 } else { c.clamp(0.0, 1.0) });
            }
        }
        self
    }
}

fn parse(s: &str, hint_ext: &str) -> Result<AggregatorConfig> {
    match hint_ext {
        "toml" => return Ok(toml::from_str(s)?),
        "json" => return Ok(serde_json::from_str(s)?),
        _ => {}
    }
    if let Ok(v) = serde_json::from_str(s) {
        return Ok(v);
    }
    toml::from_str(s).map_err(|e| anyhow!("unsupported config format: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_file_replaces_inline_table() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("weights.json");
        fs::write(
            &p,
            r#"{"default": {"priority": 10, "confidence": 0.3},
                "sources": {"bls": {"priority": 11, "confidence": 0.5}}}"#,
        )
        .unwrap();

        let cfg = parse(&format!("weights_file = '{}'", p.display()), "toml").unwrap();
        let w = cfg.source_weights();
        assert_eq!(w.priority_for("BLS"), 11);
        assert_eq!(w.priority_for("census"), 10);

        // no file configured: inline seed
        assert_eq!(AggregatorConfig::default().source_weights().priority_for("census"), 95);
    }

    #[test]
    fn toml_sections_and_defaults() {
        let s = r#"
            [retry]
            max_retries = 5

            [gap_fill]
            min_facts = 3
            strategies = [{ category = "wages", source = "bls" }]

            [[sources]]
            name = "bls"
            tier = 1
            rpm = 30
            rpd = 500
            confidence = 1.4
        "#;
        let cfg = parse(s, "toml").unwrap().sanitized();
        assert_eq!(cfg.retry.max_retries, 5);
        assert_eq!(cfg.retry.base, 1.0);
        assert_eq!(cfg.run.max_concurrency, 8);
        assert_eq!(cfg.gap_fill.min_facts, 3);
        assert!(cfg.gap_fill.enabled);
        assert_eq!(cfg.gap_fill.strategies[0].query, "{category} {query}");
        assert_eq!(cfg.sources[0].confidence, Some(1.0));
        assert_eq!(cfg.sources[0].kind, ConnectorKind::Static);
        assert_eq!(cfg.checkpoint.dir, PathBuf::from("checkpoints"));
    }

    #[test]
    fn json_is_sniffed_without_extension() {
        let s = r#"{"sources":[{"name":"adp","kind":"http","url":"http://x"}],
                    "retry":{"base":-1}}"#;
        let cfg = parse(s, "").unwrap().sanitized();
        assert_eq!(cfg.sources[0].kind, ConnectorKind::Http);
        assert_eq!(cfg.sources[0].tier, 1);
        assert_eq!(cfg.retry.base, 1.0);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse("[[[", "").is_err());
    }
}
