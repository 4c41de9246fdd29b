// src/ingest/connectors/mod.rs
//! Reference `SourceConnector` implementations and the config → connector factory.

pub mod http_json;
pub mod static_json;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde::Deserialize;

pub use http_json::HttpJsonConnector;
pub use static_json::StaticJsonConnector;

use crate::error::SourceError;
use crate::ingest::config::{ConnectorKind, SourceConfig};
use crate::ingest::types::{RawFact, SourceConnector};

/// Build the connector a `[[sources]]` entry describes.
pub fn build(cfg: &SourceConfig) -> Result<Arc<dyn SourceConnector>> {
    match cfg.kind {
        ConnectorKind::Static => {
            let path = cfg
                .fixture
                .clone()
                .ok_or_else(|| anyhow!("source {}: static connector needs `fixture`", cfg.name))?;
            Ok(Arc::new(StaticJsonConnector::from_path(&cfg.name, path)))
        }
        ConnectorKind::Http => {
            let url = cfg
                .url
                .clone()
                .ok_or_else(|| anyhow!("source {}: http connector needs `url`", cfg.name))?;
            let conn = HttpJsonConnector::new(&cfg.name, url, cfg.api_key_env.clone())?;
            Ok(Arc::new(conn))
        }
    }
}

/// Accepts either a bare array of facts or `{ "facts": [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum FactsPayload {
    Bare(Vec<RawFact>),
    Wrapped { facts: Vec<RawFact> },
}

pub(crate) fn decode_facts(body: &str) -> Result<Vec<RawFact>, SourceError> {
    let payload: FactsPayload = serde_json::from_str(body)?;
    Ok(match payload {
        FactsPayload::Bare(v) | FactsPayload::Wrapped { facts: v } => v,
    })
}
