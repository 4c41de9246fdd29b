// src/ingest/types.rs
use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::coverage::CategoryMatcher;
use crate::error::SourceError;

/// Scalar payload of a fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for FactValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactValue::Bool(b) => write!(f, "{b}"),
            FactValue::Integer(i) => write!(f, "{i}"),
            FactValue::Float(x) => write!(f, "{x}"),
            FactValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for FactValue {
    fn from(x: f64) -> Self {
        FactValue::Float(x)
    }
}

impl From<i64> for FactValue {
    fn from(i: i64) -> Self {
        FactValue::Integer(i)
    }
}

impl From<&str> for FactValue {
    fn from(s: &str) -> Self {
        FactValue::Text(s.to_string())
    }
}

impl From<String> for FactValue {
    fn from(s: String) -> Self {
        FactValue::Text(s)
    }
}

/// What a connector hands back before the orchestrator tags it with provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFact {
    pub metric: String,
    pub value: FactValue,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub entity: Option<String>,
    /// Explicit category tags, if the connector knows them.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Per-fact confidence override; the source default applies when absent.
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub raw: Option<serde_json::Map<String, serde_json::Value>>,
}

impl RawFact {
    pub fn new(metric: impl Into<String>, value: impl Into<FactValue>) -> Self {
        Self {
            metric: metric.into(),
            value: value.into(),
            unit: None,
            year: None,
            entity: None,
            categories: Vec::new(),
            confidence: None,
            raw: None,
        }
    }

    pub fn year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.categories.push(category.into());
        self
    }
}

/// Identity of a fact for deduplication: `(metric, stringified value, year, entity)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FactKey {
    pub metric: String,
    pub value: String,
    pub year: Option<i32>,
    pub entity: Option<String>,
}

/// A single extracted data point with provenance.
///
/// Fields are private: a fact is immutable once built. Priority is unsigned
/// and confidence is clamped to `[0, 1]` at construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fact {
    metric: String,
    value: FactValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    entity: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    categories: Vec<String>,
    source: String,
    source_priority: u32,
    confidence: f64,
    timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw: Option<serde_json::Map<String, serde_json::Value>>,
}

impl Fact {
    pub fn new(
        metric: impl Into<String>,
        value: impl Into<FactValue>,
        source: impl Into<String>,
        source_priority: u32,
        confidence: f64,
    ) -> Self {
        Self {
            metric: metric.into(),
            value: value.into(),
            unit: None,
            year: None,
            entity: None,
            categories: Vec::new(),
            source: source.into(),
            source_priority,
            confidence: clamp01(confidence),
            timestamp: Utc::now(),
            raw: None,
        }
    }

    /// Tag a connector's raw fact with its source provenance.
    /// A per-fact confidence override wins over the source default.
    pub fn from_raw(
        raw: RawFact,
        source: &str,
        source_priority: u32,
        default_confidence: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            metric: crate::ingest::normalize_metric(&raw.metric),
            value: raw.value,
            unit: raw.unit,
            year: raw.year,
            entity: raw.entity,
            categories: raw.categories,
            source: source.to_string(),
            source_priority,
            confidence: clamp01(raw.confidence.unwrap_or(default_confidence)),
            timestamp,
            raw: raw.raw,
        }
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.categories.push(category.into());
        self
    }

    pub fn with_raw(mut self, raw: serde_json::Map<String, serde_json::Value>) -> Self {
        self.raw = Some(raw);
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn key(&self) -> FactKey {
        FactKey {
            metric: self.metric.clone(),
            value: self.value.to_string(),
            year: self.year,
            entity: self.entity.clone(),
        }
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }
    pub fn value(&self) -> &FactValue {
        &self.value
    }
    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }
    pub fn year(&self) -> Option<i32> {
        self.year
    }
    pub fn entity(&self) -> Option<&str> {
        self.entity.as_deref()
    }
    pub fn categories(&self) -> &[String] {
        &self.categories
    }
    pub fn source(&self) -> &str {
        &self.source
    }
    pub fn source_priority(&self) -> u32 {
        self.source_priority
    }
    pub fn confidence(&self) -> f64 {
        self.confidence
    }
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
    pub fn raw(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
        self.raw.as_ref()
    }
}

/// Deduplicated facts returned by a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FactSet {
    facts: Vec<Fact>,
}

impl FactSet {
    pub fn new(facts: Vec<Fact>) -> Self {
        Self { facts }
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fact> {
        self.facts.iter()
    }

    pub fn by_metric<'a>(&'a self, metric: &'a str) -> impl Iterator<Item = &'a Fact> + 'a {
        self.facts
            .iter()
            .filter(move |f| f.metric.eq_ignore_ascii_case(metric))
    }

    /// Facts the matcher assigns to `category`.
    pub fn matching<'a, M: CategoryMatcher + ?Sized>(
        &'a self,
        category: &'a str,
        matcher: &'a M,
    ) -> impl Iterator<Item = &'a Fact> + 'a {
        self.facts
            .iter()
            .filter(move |f| matcher.matches(f, category))
    }

    pub fn into_vec(self) -> Vec<Fact> {
        self.facts
    }
}

impl IntoIterator for FactSet {
    type Item = Fact;
    type IntoIter = std::vec::IntoIter<Fact>;

    fn into_iter(self) -> Self::IntoIter {
        self.facts.into_iter()
    }
}

/// Parameters handed to a connector for one call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchParams {
    pub query: String,
    /// Classifier output for the query (entities and concepts).
    pub categories: BTreeSet<String>,
    /// Set on the targeted gap-fill pass: the one category being chased.
    pub focus_category: Option<String>,
}

impl FetchParams {
    pub fn for_query(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }
}

/// External data source. Implementations own their wire format and auth.
///
/// Any error is treated as recoverable at per-source granularity; classify it
/// with the `SourceError` variant that fits so the retry loop can do the
/// right thing.
#[async_trait::async_trait]
pub trait SourceConnector: Send + Sync {
    async fn fetch(&self, params: &FetchParams) -> Result<Vec<RawFact>, SourceError>;
    fn name(&self) -> &str;
}

fn clamp01(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}
