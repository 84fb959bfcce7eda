//! Ledger worksheet schema.
//!
//! Column order, header labels, and cell number formats are fixed — the
//! workbook is consumed by downstream spreadsheet tooling that addresses
//! columns positionally.

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;

use fiiwatch_core::FiiRecord;

pub const SHEET_NAME: &str = "Ledger";

pub const HEADERS: [&str; 7] = [
    "fund_code",
    "event_type",
    "event_date",
    "monetary_amount",
    "summary_text",
    "source_fingerprint",
    "ingested_at",
];

/// Number format for `event_date` cells (pt-BR convention).
pub const DATE_FORMAT: &str = "dd/mm/yyyy";
/// Number format for `monetary_amount` cells.
pub const CURRENCY_FORMAT: &str = "R$ #,##0.00";

/// Excel's day zero for the 1900 date system.
fn excel_epoch() -> NaiveDate {
    // 1899-12-30 is a valid calendar date; the expect can only fire if
    // chrono's calendar itself changes.
    NaiveDate::from_ymd_opt(1899, 12, 30).expect("static date")
}

/// Converts an Excel serial day number to a calendar date.
#[must_use]
pub fn date_from_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 0.0 || serial > 2_958_465.0 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    let days = serial.trunc() as i64;
    excel_epoch().checked_add_signed(Duration::days(days))
}

/// One materialized ledger row, either read from the existing workbook or
/// converted from a freshly extracted record.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRow {
    pub fund_code: String,
    pub event_type: String,
    pub event_date: NaiveDate,
    pub monetary_amount: Option<Decimal>,
    pub summary: String,
    pub fingerprint: String,
    /// RFC 3339 timestamp kept as a string cell; it is provenance metadata,
    /// not a value downstream tooling computes on.
    pub ingested_at: String,
}

impl LedgerRow {
    /// Dedup key: the ledger-wide uniqueness invariant.
    #[must_use]
    pub fn key(&self) -> (String, String) {
        (self.fund_code.clone(), self.fingerprint.clone())
    }
}

impl From<&FiiRecord> for LedgerRow {
    fn from(record: &FiiRecord) -> Self {
        Self {
            fund_code: record.fund_code.clone(),
            event_type: record.event_type.as_ledger_label(),
            event_date: record.event_date,
            monetary_amount: record.monetary_amount,
            summary: record.summary.clone(),
            fingerprint: record.source_fingerprint.clone(),
            ingested_at: record.ingested_at.to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_round_trip_for_known_date() {
        // 2024-05-10 is Excel serial 45422.
        assert_eq!(
            date_from_serial(45_422.0),
            NaiveDate::from_ymd_opt(2024, 5, 10)
        );
    }

    #[test]
    fn serial_rejects_nonsense() {
        assert_eq!(date_from_serial(-1.0), None);
        assert_eq!(date_from_serial(f64::NAN), None);
        assert_eq!(date_from_serial(f64::INFINITY), None);
    }

    #[test]
    fn row_from_record_uses_ledger_labels() {
        use chrono::Utc;
        use fiiwatch_core::EventType;

        let record = FiiRecord {
            fund_code: "Alpha Fund".to_string(),
            event_type: EventType::Distribution,
            event_date: NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
            monetary_amount: Decimal::from_f64_retain(0.5),
            summary: "Distribuição".to_string(),
            source_fingerprint: "fp".to_string(),
            ingested_at: Utc::now(),
            date_flagged: false,
        };
        let row = LedgerRow::from(&record);
        assert_eq!(row.event_type, "distribution");
        assert_eq!(row.key(), ("Alpha Fund".to_string(), "fp".to_string()));
    }
}
