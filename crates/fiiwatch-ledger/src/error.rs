use thiserror::Error;

/// Errors from ledger consolidation. Any of these leaves the on-disk
/// ledger at its pre-run state.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("cannot read ledger workbook {path}: {reason}")]
    Read { path: String, reason: String },

    /// An existing row does not match the ledger schema. Refusing to rewrite
    /// is deliberate: a forgiving parse here would silently drop or mangle
    /// historical rows on the next flush.
    #[error("ledger row {row} is malformed: {reason}")]
    RowShape { row: usize, reason: String },

    #[error("cannot build ledger workbook: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Another run holds the ledger. Single-writer discipline: the caller
    /// reports and lets the next scheduled run retry.
    #[error("ledger is locked by another run: {path}")]
    Locked { path: String },
}
