//! Batch consolidation with the (fund_code, fingerprint) uniqueness
//! invariant and all-or-nothing flush.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use fiiwatch_core::FiiRecord;

use crate::error::LedgerError;
use crate::lock::RunLock;
use crate::schema::LedgerRow;
use crate::workbook::{read_rows, write_rows};

/// Outcome of one consolidation batch.
#[derive(Debug)]
pub struct ConsolidationResult {
    pub appended: usize,
    pub duplicates_skipped: usize,
    /// Total rows in the workbook after the flush (or before, when nothing
    /// new arrived and the file was left untouched).
    pub total_rows: usize,
    pub path: PathBuf,
}

/// Appends `records` to the ledger at `ledger_path`.
///
/// Acquires the run lock, loads every existing `(fund_code, fingerprint)`
/// pair into an in-memory index before any write decision, silently skips
/// (but counts) duplicates, then flushes the rebuilt workbook via temp file
/// + atomic rename. If no record survives dedup the file is not rewritten
/// at all.
///
/// # Errors
///
/// Any [`LedgerError`] leaves the on-disk ledger byte-identical to its
/// pre-run state; the caller reports it as a consolidation failure and the
/// batch is retried on the next scheduled run.
pub fn append_records(
    ledger_path: &Path,
    records: &[FiiRecord],
) -> Result<ConsolidationResult, LedgerError> {
    let _lock = RunLock::acquire(ledger_path)?;

    let mut rows = read_rows(ledger_path)?;
    let mut index: HashSet<(String, String)> = rows.iter().map(LedgerRow::key).collect();

    let mut appended = 0usize;
    let mut duplicates_skipped = 0usize;

    for record in records {
        let key = (record.fund_code.clone(), record.source_fingerprint.clone());
        if index.contains(&key) {
            duplicates_skipped += 1;
            tracing::debug!(
                fund = %record.fund_code,
                fingerprint = %record.source_fingerprint,
                "duplicate record skipped"
            );
            continue;
        }
        index.insert(key);
        rows.push(LedgerRow::from(record));
        appended += 1;
    }

    if appended == 0 {
        tracing::info!(path = %ledger_path.display(), duplicates_skipped, "nothing to append");
        return Ok(ConsolidationResult {
            appended,
            duplicates_skipped,
            total_rows: rows.len(),
            path: ledger_path.to_path_buf(),
        });
    }

    flush_atomically(ledger_path, &rows)?;

    tracing::info!(
        path = %ledger_path.display(),
        appended,
        duplicates_skipped,
        total = rows.len(),
        "ledger flushed"
    );

    Ok(ConsolidationResult {
        appended,
        duplicates_skipped,
        total_rows: rows.len(),
        path: ledger_path.to_path_buf(),
    })
}

/// Writes the workbook next to the target and renames over it. The rename
/// is the commit point; everything before it is invisible to readers.
fn flush_atomically(ledger_path: &Path, rows: &[LedgerRow]) -> Result<(), LedgerError> {
    if let Some(parent) = ledger_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| LedgerError::Io {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }

    let tmp_path = {
        let mut name = ledger_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "ledger.xlsx".to_string());
        name.push_str(".tmp");
        ledger_path.with_file_name(name)
    };

    if let Err(e) = write_rows(&tmp_path, rows) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }

    std::fs::rename(&tmp_path, ledger_path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp_path);
        LedgerError::Io {
            path: ledger_path.display().to_string(),
            source: e,
        }
    })
}
