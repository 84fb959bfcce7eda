//! Last-processed watermark, persisted between runs.
//!
//! The listing fetchers yield each document once per run; this store is what
//! makes reruns converge. It records, per source, every fingerprint that has
//! reached the ledger plus the last successful run timestamp. The file is
//! only rewritten after a successful ledger flush — a failed run re-fetches
//! its documents on the next schedule.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fiiwatch_core::SourceKind;

use crate::error::FetchError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceWatermark {
    #[serde(default)]
    pub seen: HashSet<String>,
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
}

/// Per-source watermark state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Watermark {
    #[serde(default)]
    sources: HashMap<SourceKind, SourceWatermark>,
}

impl Watermark {
    #[must_use]
    pub fn seen(&self, source: SourceKind) -> HashSet<String> {
        self.sources
            .get(&source)
            .map(|s| s.seen.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn last_run(&self, source: SourceKind) -> Option<DateTime<Utc>> {
        self.sources.get(&source).and_then(|s| s.last_run)
    }

    /// Records fingerprints that reached the ledger and stamps the run time.
    pub fn mark_processed<I>(&mut self, source: SourceKind, fingerprints: I, run_time: DateTime<Utc>)
    where
        I: IntoIterator<Item = String>,
    {
        let entry = self.sources.entry(source).or_default();
        entry.seen.extend(fingerprints);
        entry.last_run = Some(run_time);
    }
}

/// Loads and saves the watermark JSON file.
pub struct WatermarkStore {
    path: PathBuf,
}

impl WatermarkStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Loads the watermark. A missing file is an empty watermark (first
    /// run); a corrupt file is an error, since silently starting over would
    /// re-append every historical document.
    ///
    /// # Errors
    ///
    /// [`FetchError::WatermarkIo`] on read failure other than not-found,
    /// [`FetchError::WatermarkParse`] on corrupt JSON.
    pub fn load(&self) -> Result<Watermark, FetchError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Watermark::default());
            }
            Err(e) => {
                return Err(FetchError::WatermarkIo {
                    path: self.path.display().to_string(),
                    source: e,
                });
            }
        };
        serde_json::from_str(&raw).map_err(|e| FetchError::WatermarkParse {
            path: self.path.display().to_string(),
            source: e,
        })
    }

    /// Persists the watermark, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// [`FetchError::WatermarkIo`] on any write failure.
    pub fn save(&self, watermark: &Watermark) -> Result<(), FetchError> {
        let io_err = |e: std::io::Error| FetchError::WatermarkIo {
            path: self.path.display().to_string(),
            source: e,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let json = serde_json::to_string_pretty(watermark).map_err(|e| {
            FetchError::WatermarkParse {
                path: self.path.display().to_string(),
                source: e,
            }
        })?;
        std::fs::write(&self.path, json).map_err(io_err)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
