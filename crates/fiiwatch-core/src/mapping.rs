//! DEPARA fund-code mapping.
//!
//! The mapping workbook ("de-para") translates tickers as they appear on the
//! listing pages into canonical fund identifiers. It is loaded once per run
//! and read-only afterwards, so it can be shared freely across concurrent
//! pipeline stages. A missing or unreadable workbook aborts the run before
//! any fetching — every downstream dedup and report depends on it.

use std::collections::HashMap;
use std::path::Path;

use calamine::{open_workbook_auto, DataType, Reader};
use regex::Regex;

use crate::config::ConfigError;

/// Result of resolving a raw listing code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Canonical { code: String },
    Unmapped { raw: String },
}

impl Resolution {
    /// The string that goes into the ledger's `fund_code` column.
    ///
    /// Unmapped codes keep the raw ticker behind a greppable sentinel so
    /// operators can triage missing DEPARA entries without losing data.
    #[must_use]
    pub fn ledger_code(&self) -> String {
        match self {
            Resolution::Canonical { code } => code.clone(),
            Resolution::Unmapped { raw } => format!("UNMAPPED:{raw}"),
        }
    }

    #[must_use]
    pub fn is_unmapped(&self) -> bool {
        matches!(self, Resolution::Unmapped { .. })
    }
}

/// Immutable fund-code lookup table, keyed by normalized raw ticker.
#[derive(Debug, Clone)]
pub struct FundMapping {
    entries: HashMap<String, String>,
}

/// Header tokens tolerated in row 1 of the DEPARA workbook.
const HEADER_TOKENS: &[&str] = &["DE", "CODIGO", "CÓDIGO", "TICKER", "RAW"];

impl FundMapping {
    /// Load the mapping from the first sheet of the DEPARA workbook.
    ///
    /// Column A is the raw ticker, column B the canonical identifier /
    /// display name. A header row is skipped when recognized. Duplicate raw
    /// codes keep the first occurrence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MappingRead`] if the file cannot be opened and
    /// [`ConfigError::MappingShape`] if the first sheet is missing or holds
    /// no usable rows.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let mut workbook = open_workbook_auto(path).map_err(|e| ConfigError::MappingRead {
            path: display.clone(),
            reason: e.to_string(),
        })?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| ConfigError::MappingShape {
                path: display.clone(),
                reason: "workbook has no sheets".to_string(),
            })?
            .map_err(|e| ConfigError::MappingRead {
                path: display.clone(),
                reason: e.to_string(),
            })?;

        let mut entries = HashMap::new();
        for (idx, row) in range.rows().enumerate() {
            let raw = row.first().and_then(DataType::as_string).unwrap_or_default();
            let canonical = row.get(1).and_then(DataType::as_string).unwrap_or_default();

            let key = normalize_code(&raw);
            if key.is_empty() || canonical.trim().is_empty() {
                continue;
            }
            if idx == 0 && HEADER_TOKENS.contains(&key.as_str()) {
                continue;
            }
            entries.entry(key).or_insert_with(|| canonical.trim().to_string());
        }

        if entries.is_empty() {
            return Err(ConfigError::MappingShape {
                path: display,
                reason: "no mapping rows found in first sheet".to_string(),
            });
        }

        Ok(Self { entries })
    }

    /// Build a mapping from in-memory pairs. Test seam; normalization matches
    /// [`FundMapping::load`].
    #[must_use]
    pub fn from_pairs<I, S, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, T)>,
        S: AsRef<str>,
        T: Into<String>,
    {
        let entries = pairs
            .into_iter()
            .map(|(raw, canonical)| (normalize_code(raw.as_ref()), canonical.into()))
            .filter(|(k, _)| !k.is_empty())
            .collect();
        Self { entries }
    }

    /// Resolve a raw listing code to its canonical identifier.
    ///
    /// Lookup is case-insensitive and whitespace-normalized. Unmapped codes
    /// come back as [`Resolution::Unmapped`] — never dropped.
    #[must_use]
    pub fn resolve(&self, raw_code: &str) -> Resolution {
        let key = normalize_code(raw_code);
        match self.entries.get(&key) {
            Some(code) => Resolution::Canonical { code: code.clone() },
            None => Resolution::Unmapped { raw: key },
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Uppercase and collapse all whitespace runs, so `" abcd11 "`, `"ABCD11"`
/// and `"Abcd 11"` all key the same entry.
#[must_use]
pub fn normalize_code(raw: &str) -> String {
    // A OnceLock would save the recompile, but mapping lookups are not hot:
    // one per document per run.
    let ws = Regex::new(r"\s+").expect("static regex");
    ws.replace_all(raw.trim(), " ").to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FundMapping {
        FundMapping::from_pairs([("ABCD11", "Alpha Fund"), ("WXYZ11", "Omega Fund")])
    }

    #[test]
    fn resolve_is_case_insensitive() {
        let m = sample();
        assert_eq!(
            m.resolve("abcd11"),
            Resolution::Canonical {
                code: "Alpha Fund".to_string()
            }
        );
    }

    #[test]
    fn resolve_normalizes_whitespace() {
        let m = sample();
        assert_eq!(
            m.resolve("  wxyz11 \t"),
            Resolution::Canonical {
                code: "Omega Fund".to_string()
            }
        );
    }

    #[test]
    fn unmapped_codes_keep_raw_ticker_in_sentinel() {
        let m = sample();
        let r = m.resolve("qqqq11");
        assert!(r.is_unmapped());
        assert_eq!(r.ledger_code(), "UNMAPPED:QQQQ11");
    }

    #[test]
    fn normalize_collapses_inner_runs() {
        assert_eq!(normalize_code(" ab  cd\t11 "), "AB CD 11");
    }

    #[test]
    fn load_reads_two_column_workbook_and_skips_header() {
        use rust_xlsxwriter::Workbook;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depara.xlsx");

        let mut wb = Workbook::new();
        let ws = wb.add_worksheet();
        ws.write_string(0, 0, "DE").unwrap();
        ws.write_string(0, 1, "PARA").unwrap();
        ws.write_string(1, 0, "ABCD11").unwrap();
        ws.write_string(1, 1, "Alpha Fund").unwrap();
        ws.write_string(2, 0, "WXYZ11").unwrap();
        ws.write_string(2, 1, "Omega Fund").unwrap();
        wb.save(&path).unwrap();

        let m = FundMapping::load(&path).unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(
            m.resolve("abcd11"),
            Resolution::Canonical {
                code: "Alpha Fund".to_string()
            }
        );
    }

    #[test]
    fn load_missing_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.xlsx");
        let result = FundMapping::load(&path);
        assert!(
            matches!(result, Err(ConfigError::MappingRead { .. })),
            "expected MappingRead, got: {result:?}"
        );
    }
}
