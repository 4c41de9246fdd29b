// src/ingest/connectors/http_json.rs
//! Generic JSON-over-HTTP connector.
//!
//! `GET {url}?q=<query>[&category=<focus>][&categories=a,b]`, optional bearer
//! key read from the env var named in config. The response body is a fact
//! array or `{ "facts": [...] }`.
//!
//! Status mapping: 429 → `RateLimited` (with `Retry-After` seconds if sent),
//! 401/403 → `Config`, other 4xx/5xx → `Transient`, client timeout →
//! `Timeout`, undecodable body → `Parse`.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, StatusCode};

use crate::error::SourceError;
use crate::ingest::connectors::decode_facts;
use crate::ingest::types::{FetchParams, RawFact, SourceConnector};

pub struct HttpJsonConnector {
    name: String,
    url: String,
    api_key_env: Option<String>,
    http: reqwest::Client,
}

impl HttpJsonConnector {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        api_key_env: Option<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("fact-aggregator/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .context("building reqwest client")?;
        Ok(Self {
            name: name.into(),
            url: url.into(),
            api_key_env,
            http,
        })
    }

    fn api_key(&self) -> Result<Option<String>, SourceError> {
        let Some(var) = self.api_key_env.as_deref() else {
            return Ok(None);
        };
        match std::env::var(var) {
            Ok(v) if !v.trim().is_empty() => Ok(Some(v)),
            _ => Err(SourceError::Config(format!("missing api key env {var}"))),
        }
    }
}

#[async_trait]
impl SourceConnector for HttpJsonConnector {
    async fn fetch(&self, params: &FetchParams) -> Result<Vec<RawFact>, SourceError> {
        let key = self.api_key()?;

        let mut query: Vec<(&str, String)> = vec![("q", params.query.clone())];
        if let Some(focus) = &params.focus_category {
            query.push(("category", focus.clone()));
        }
        if !params.categories.is_empty() {
            let joined = params.categories.iter().cloned().collect::<Vec<_>>().join(",");
            query.push(("categories", joined));
        }

        let mut req = self.http.get(&self.url).query(&query);
        if let Some(k) = &key {
            req = req.bearer_auth(k);
        }

        let resp = req.send().await.map_err(transport_error)?;
        let status = resp.status();
        if !status.is_success() {
            let retry_after = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            return Err(status_error(status, retry_after));
        }

        let body = resp.text().await.map_err(transport_error)?;
        decode_facts(&body)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn transport_error(e: reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::Timeout
    } else {
        SourceError::Transient(e.to_string())
    }
}

pub(crate) fn status_error(status: StatusCode, retry_after: Option<f64>) -> SourceError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => SourceError::RateLimited { retry_after },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            SourceError::Config(format!("http {}", status.as_u16()))
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => SourceError::Timeout,
        s => SourceError::Transient(format!("http {}", s.as_u16())),
    }
}

/// Delta-seconds form only; HTTP dates are ignored.
pub(crate) fn parse_retry_after(v: &str) -> Option<f64> {
    let secs: f64 = v.trim().parse().ok()?;
    (secs.is_finite() && secs >= 0.0).then_some(secs)
}
