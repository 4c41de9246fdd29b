// src/ingest/checkpoint.rs
//! File-backed resumable cursors, one JSON file per `(domain, source)`.
//!
//! Writes are atomic (tmp file + rename). Reads never fail: a missing,
//! unreadable or malformed file is simply "no checkpoint". One writer per
//! `(domain, source)` is assumed; nothing here locks.

use std::fs;
use std::future::Future;
use std::fmt::Write as _;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub domain: String,
    pub source: String,
    pub current_index: usize,
    pub total_items: usize,
    pub progress_percent: f64,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Checkpoint {
    fn belongs_to(&self, domain: &str, source: &str) -> bool {
        self.domain.eq_ignore_ascii_case(domain) && self.source.eq_ignore_ascii_case(source)
    }
}

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    /// Store rooted at `dir`. The directory is created lazily on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Deterministic file path for a pair. Both parts go through [`slug`],
    /// which never emits `_`, so the `__` separator keeps distinct pairs apart.
    pub fn path_for(&self, domain: &str, source: &str) -> PathBuf {
        self.dir
            .join(format!("{}__{}.json", slug(source), slug(domain)))
    }

    pub fn save(
        &self,
        domain: &str,
        source: &str,
        current_index: usize,
        total_items: usize,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Checkpoint> {
        let cp = Checkpoint {
            domain: domain.to_string(),
            source: source.to_string(),
            current_index,
            total_items,
            progress_percent: progress_percent(current_index, total_items),
            last_updated: Utc::now(),
            metadata,
        };

        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating checkpoint dir {}", self.dir.display()))?;

        let path = self.path_for(domain, source);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(&cp).context("serializing checkpoint")?;
        {
            let mut f = fs::File::create(&tmp)
                .with_context(|| format!("creating {}", tmp.display()))?;
            f.write_all(&json)
                .with_context(|| format!("writing {}", tmp.display()))?;
            f.sync_all().ok();
        }
        fs::rename(&tmp, &path).with_context(|| format!("renaming into {}", path.display()))?;

        tracing::debug!(
            domain,
            source,
            current_index,
            total_items,
            progress = cp.progress_percent,
            "checkpoint saved"
        );
        Ok(cp)
    }

    /// `None` on missing file or any read/parse/schema problem.
    pub fn load(&self, domain: &str, source: &str) -> Option<Checkpoint> {
        let path = self.path_for(domain, source);
        let content = fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<Checkpoint>(&content) {
            Ok(cp) if cp.belongs_to(domain, source) => Some(cp),
            Ok(cp) => {
                tracing::warn!(
                    path = %path.display(),
                    found_domain = %cp.domain,
                    found_source = %cp.source,
                    "checkpoint belongs to another pair; ignoring"
                );
                None
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "corrupt checkpoint; ignoring");
                None
            }
        }
    }

    pub fn resume_index(&self, domain: &str, source: &str) -> usize {
        self.load(domain, source)
            .map(|cp| cp.current_index)
            .unwrap_or(0)
    }

    /// Delete the checkpoint. Returns whether a file for this pair existed.
    /// A file recording a different pair is left alone.
    pub fn clear(&self, domain: &str, source: &str) -> bool {
        let path = self.path_for(domain, source);
        if let Ok(content) = fs::read_to_string(&path) {
            if let Ok(cp) = serde_json::from_str::<Checkpoint>(&content) {
                if !cp.belongs_to(domain, source) {
                    tracing::warn!(
                        path = %path.display(),
                        found_domain = %cp.domain,
                        found_source = %cp.source,
                        "checkpoint belongs to another pair; not clearing"
                    );
                    return false;
                }
            }
        }
        match fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove checkpoint");
                false
            }
        }
    }

    /// Every readable checkpoint in the store, sorted by file name.
    pub fn list_all(&self) -> Vec<Checkpoint> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };

        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("json"))
            .collect();
        paths.sort();

        paths
            .iter()
            .filter_map(|p| fs::read_to_string(p).ok())
            .filter_map(|s| serde_json::from_str::<Checkpoint>(&s).ok())
            .collect()
    }
}

/// `round(current / max(total, 1) * 100, 2)`.
pub fn progress_percent(current_index: usize, total_items: usize) -> f64 {
    let pct = current_index as f64 / total_items.max(1) as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

/// ASCII-lowercase, then percent-encode every byte outside `[a-z0-9-]`.
/// Injective over case-insensitive names, and keeps path separators, `.`
/// and `_` out of the result.
pub fn slug(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.to_ascii_lowercase().bytes() {
        if b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' {
            out.push(char::from(b));
        } else {
            let _ = write!(out, "%{b:02X}");
        }
    }
    out
}

/// Result of a [`run_resumable`] job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumableOutcome {
    pub resumed_from: usize,
    pub processed: usize,
    pub total: usize,
}

/// Process `items` in batches, resuming from the stored cursor.
///
/// After each batch the cursor is saved; on completion the checkpoint is
/// cleared. If a batch fails the checkpoint from the last good batch stays
/// on disk and the error is returned.
pub async fn run_resumable<T, F, Fut>(
    store: &CheckpointStore,
    domain: &str,
    source: &str,
    items: &[T],
    batch_size: usize,
    mut process: F,
) -> Result<ResumableOutcome>
where
    F: FnMut(usize, &[T]) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let total = items.len();
    let batch_size = batch_size.max(1);
    let start = store.resume_index(domain, source).min(total);
    if start > 0 {
        tracing::info!(domain, source, start, total, "resuming from checkpoint");
    }

    let mut cursor = start;
    while cursor < total {
        let end = (cursor + batch_size).min(total);
        process(cursor, &items[cursor..end])
            .await
            .with_context(|| format!("batch {cursor}..{end} for {source}/{domain}"))?;

        let mut meta = serde_json::Map::new();
        meta.insert("batchSize".into(), serde_json::json!(batch_size));
        store.save(domain, source, end, total, meta)?;
        cursor = end;
    }

    store.clear(domain, source);
    Ok(ResumableOutcome {
        resumed_from: start,
        processed: total - start,
        total,
    })
}
