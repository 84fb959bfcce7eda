//! Consolidated ledger persistence.
//!
//! The ledger is one append-only worksheet read by spreadsheet tooling
//! outside this system, so column formats (date and currency cells) are a
//! compatibility contract, not presentation sugar. Writes are all-or-nothing
//! per run: the updated workbook is built in memory and atomically renamed
//! over the previous file only when the whole batch applied.

pub mod consolidate;
pub mod error;
pub mod lock;
pub mod schema;
pub mod workbook;

pub use consolidate::{append_records, ConsolidationResult};
pub use error::LedgerError;
pub use lock::RunLock;
pub use schema::LedgerRow;
