// src/ingest/connectors/static_json.rs
//! Facts served from an in-memory list or a JSON fixture on disk.
//!
//! On a targeted pass (`focus_category` set) only facts matching that
//! category are returned.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::coverage::{CategoryMatcher, SubstringMatcher};
use crate::error::SourceError;
use crate::ingest::connectors::decode_facts;
use crate::ingest::types::{Fact, FetchParams, RawFact, SourceConnector};

enum Origin {
    Inline(Vec<RawFact>),
    File(PathBuf),
}

pub struct StaticJsonConnector {
    name: String,
    origin: Origin,
}

impl StaticJsonConnector {
    pub fn new(name: impl Into<String>, facts: Vec<RawFact>) -> Self {
        Self {
            name: name.into(),
            origin: Origin::Inline(facts),
        }
    }

    /// The fixture is read on every fetch, so edits show up without a restart.
    pub fn from_path(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            origin: Origin::File(path.into()),
        }
    }

    async fn all_facts(&self) -> Result<Vec<RawFact>, SourceError> {
        match &self.origin {
            Origin::Inline(v) => Ok(v.clone()),
            Origin::File(p) => {
                let body = tokio::fs::read_to_string(p).await.map_err(|e| {
                    SourceError::Config(format!("fixture {}: {e}", p.display()))
                })?;
                decode_facts(&body)
            }
        }
    }
}

#[async_trait]
impl SourceConnector for StaticJsonConnector {
    async fn fetch(&self, params: &FetchParams) -> Result<Vec<RawFact>, SourceError> {
        let facts = self.all_facts().await?;
        let Some(focus) = params.focus_category.as_deref() else {
            return Ok(facts);
        };
        Ok(facts
            .into_iter()
            .filter(|raw| {
                let probe = Fact::from_raw(raw.clone(), &self.name, 0, 0.0, chrono::Utc::now());
                SubstringMatcher.matches(&probe, focus)
            })
            .collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn inline_returns_everything() {
        let c = StaticJsonConnector::new("s", vec![RawFact::new("a", 1.0), RawFact::new("b", 2.0)]);
        let out = c.fetch(&FetchParams::for_query("q")).await.unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(c.name(), "s");
    }

    #[tokio::test]
    async fn focus_filters_by_category() {
        let c = StaticJsonConnector::new(
            "s",
            vec![
                RawFact::new("median wages", 1.0),
                RawFact::new("rent index", 2.0).category("housing"),
            ],
        );
        let mut p = FetchParams::for_query("q");
        p.focus_category = Some("housing".into());
        let out = c.fetch(&p).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].metric, "rent index");
    }

    #[tokio::test]
    async fn missing_fixture_is_config_error() {
        let c = StaticJsonConnector::from_path("s", "/definitely/not/here.json");
        let err = c.fetch(&FetchParams::default()).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn bad_fixture_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("f.json");
        std::fs::write(&p, "{oops").unwrap();
        let c = StaticJsonConnector::from_path("s", &p);
        let err = c.fetch(&FetchParams::default()).await.unwrap_err();
        assert!(matches!(err, SourceError::Parse(_)));
    }
}
