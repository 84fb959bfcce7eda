//! Per-run outcome aggregation.
//!
//! One `RunReport` is created at pipeline start, filled in as stages
//! complete, and handed to the notifier exactly once — success, partial
//! failure, or fatal error. It is never persisted beyond the email.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::types::SourceKind;

/// Pipeline stage a document failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Fetch,
    PdfExtract,
    LlmExtract,
    Consolidate,
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureStage::Fetch => write!(f, "fetch"),
            FailureStage::PdfExtract => write!(f, "pdf_extract"),
            FailureStage::LlmExtract => write!(f, "llm_extract"),
            FailureStage::Consolidate => write!(f, "consolidate"),
        }
    }
}

/// One document that did not make it into the ledger, with enough context
/// for manual review.
#[derive(Debug, Clone)]
pub struct DocumentFailure {
    pub source: SourceKind,
    pub url: String,
    pub fingerprint: Option<String>,
    pub stage: FailureStage,
    pub reason: String,
}

/// Aggregate outcome of one pipeline execution.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Documents discovered and downloaded (both sources).
    pub fetched: usize,
    /// Documents that produced a typed record.
    pub extracted: usize,
    /// Rows actually appended to the ledger this run.
    pub recorded: usize,
    /// Records skipped by the (fund_code, fingerprint) uniqueness check.
    pub duplicates_skipped: usize,
    pub failures: Vec<DocumentFailure>,
    pub unmapped_codes: Vec<String>,
    pub ledger_path: Option<PathBuf>,
    /// Set when the run aborted as a whole (configuration or consolidation
    /// failure). Per-document failures never set this.
    pub fatal: Option<String>,
}

impl RunReport {
    #[must_use]
    pub fn begin() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            fetched: 0,
            extracted: 0,
            recorded: 0,
            duplicates_skipped: 0,
            failures: Vec::new(),
            unmapped_codes: Vec::new(),
            ledger_path: None,
            fatal: None,
        }
    }

    pub fn push_failure(&mut self, failure: DocumentFailure) {
        self.failures.push(failure);
    }

    /// Record an unmapped listing code, deduplicated for the report.
    pub fn push_unmapped(&mut self, code: &str) {
        if !self.unmapped_codes.iter().any(|c| c == code) {
            self.unmapped_codes.push(code.to_string());
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// A run succeeded when nothing fatal happened, whatever the
    /// per-document failure count.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.fatal.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_report_is_successful_and_empty() {
        let r = RunReport::begin();
        assert!(r.succeeded());
        assert_eq!(r.fetched, 0);
        assert!(r.failures.is_empty());
        assert!(r.finished_at.is_none());
    }

    #[test]
    fn unmapped_codes_are_deduplicated() {
        let mut r = RunReport::begin();
        r.push_unmapped("UNMAPPED:QQQQ11");
        r.push_unmapped("UNMAPPED:QQQQ11");
        r.push_unmapped("UNMAPPED:ZZZZ11");
        assert_eq!(r.unmapped_codes.len(), 2);
    }

    #[test]
    fn fatal_marks_run_failed() {
        let mut r = RunReport::begin();
        r.fatal = Some("ledger flush failed".to_string());
        assert!(!r.succeeded());
    }
}
