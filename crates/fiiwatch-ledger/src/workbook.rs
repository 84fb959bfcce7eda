//! Reading and rebuilding the ledger workbook.
//!
//! `calamine` reads the existing file; `rust_xlsxwriter` writes the rebuilt
//! one. Rebuilding (rather than in-place appending) is what makes the
//! atomic-rename flush possible, at the cost of strict parsing of rows this
//! system itself wrote.

use std::path::Path;
use std::str::FromStr;

use calamine::{open_workbook_auto, Data, DataType, Reader};
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

use crate::error::LedgerError;
use crate::schema::{
    date_from_serial, LedgerRow, CURRENCY_FORMAT, DATE_FORMAT, HEADERS, SHEET_NAME,
};

/// Reads all rows from an existing ledger workbook. A missing file is an
/// empty ledger (first run).
///
/// # Errors
///
/// [`LedgerError::Read`] if the file exists but cannot be opened;
/// [`LedgerError::RowShape`] if any row fails strict parsing — the caller
/// must abort rather than rewrite a workbook it cannot faithfully carry.
pub fn read_rows(path: &Path) -> Result<Vec<LedgerRow>, LedgerError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let display = path.display().to_string();

    let mut workbook = open_workbook_auto(path).map_err(|e| LedgerError::Read {
        path: display.clone(),
        reason: e.to_string(),
    })?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| LedgerError::Read {
            path: display.clone(),
            reason: "workbook has no sheets".to_string(),
        })?
        .map_err(|e| LedgerError::Read {
            path: display,
            reason: e.to_string(),
        })?;

    let mut rows = Vec::new();
    for (idx, row) in range.rows().enumerate() {
        if idx == 0 && is_header_row(row) {
            continue;
        }
        if row.iter().all(DataType::is_empty) {
            continue;
        }
        rows.push(parse_row(idx, row)?);
    }
    Ok(rows)
}

fn is_header_row(row: &[Data]) -> bool {
    matches!(row.first(), Some(Data::String(s)) if s.trim() == HEADERS[0])
}

fn parse_row(idx: usize, row: &[Data]) -> Result<LedgerRow, LedgerError> {
    let shape = |reason: String| LedgerError::RowShape { row: idx, reason };

    let string_cell = |col: usize, name: &str| -> Result<String, LedgerError> {
        match row.get(col) {
            Some(Data::String(s)) => Ok(s.trim().to_string()),
            Some(Data::Empty) | None => Err(shape(format!("missing {name}"))),
            Some(other) => Ok(other.to_string().trim().to_string()),
        }
    };

    let event_date = match row.get(2) {
        Some(Data::DateTime(dt)) => date_from_serial(dt.as_f64())
            .ok_or_else(|| shape(format!("event_date serial out of range: {}", dt.as_f64())))?,
        Some(Data::DateTimeIso(s)) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map_err(|e| shape(format!("event_date not ISO: {e}")))?,
        Some(Data::String(s)) => parse_date_cell(s)
            .ok_or_else(|| shape(format!("event_date not a recognized date: {s:?}")))?,
        other => return Err(shape(format!("event_date cell is {other:?}"))),
    };

    let monetary_amount = match row.get(3) {
        Some(Data::Empty) | None => None,
        Some(Data::Float(f)) => Some(
            Decimal::from_f64_retain(*f)
                .ok_or_else(|| shape(format!("monetary_amount not finite: {f}")))?,
        ),
        Some(Data::Int(i)) => Some(Decimal::from(*i)),
        Some(Data::String(s)) if s.trim().is_empty() => None,
        Some(Data::String(s)) => Some(
            Decimal::from_str(s.trim())
                .map_err(|e| shape(format!("monetary_amount not a number: {e}")))?,
        ),
        other => return Err(shape(format!("monetary_amount cell is {other:?}"))),
    };

    Ok(LedgerRow {
        fund_code: string_cell(0, "fund_code")?,
        event_type: string_cell(1, "event_type")?,
        event_date,
        monetary_amount,
        summary: string_cell(4, "summary_text").unwrap_or_default(),
        fingerprint: string_cell(5, "source_fingerprint")?,
        ingested_at: string_cell(6, "ingested_at").unwrap_or_default(),
    })
}

fn parse_date_cell(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d"))
        .ok()
}

/// Builds the full workbook and saves it to `path` (normally the temp file
/// of the atomic flush).
///
/// Every row gets the schema's date and currency cell formats — the hard
/// compatibility requirement for downstream spreadsheet tooling.
///
/// # Errors
///
/// [`LedgerError::Write`] on any workbook construction or save failure;
/// [`LedgerError::RowShape`] if a date cannot be represented in Excel's
/// date system.
pub fn write_rows(path: &Path, rows: &[LedgerRow]) -> Result<(), LedgerError> {
    use chrono::Datelike;

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    let header_format = Format::new().set_bold();
    let date_format = Format::new().set_num_format(DATE_FORMAT);
    let currency_format = Format::new().set_num_format(CURRENCY_FORMAT);

    for (col, header) in HEADERS.iter().enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        sheet.write_string_with_format(0, col as u16, *header, &header_format)?;
    }
    sheet.set_column_width(4, 60)?; // summary_text
    sheet.set_column_width(5, 44)?; // source_fingerprint

    for (i, row) in rows.iter().enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        let r = (i + 1) as u32;

        sheet.write_string(r, 0, &row.fund_code)?;
        sheet.write_string(r, 1, &row.event_type)?;

        let year = u16::try_from(row.event_date.year()).map_err(|_| LedgerError::RowShape {
            row: i,
            reason: format!("event_date year {} not representable", row.event_date.year()),
        })?;
        #[allow(clippy::cast_possible_truncation)]
        let excel_date = ExcelDateTime::from_ymd(
            year,
            row.event_date.month() as u8,
            row.event_date.day() as u8,
        )?;
        sheet.write_datetime_with_format(r, 2, excel_date, &date_format)?;

        if let Some(amount) = row.monetary_amount {
            let value = amount.to_f64().ok_or_else(|| LedgerError::RowShape {
                row: i,
                reason: format!("monetary_amount {amount} not representable"),
            })?;
            sheet.write_number_with_format(r, 3, value, &currency_format)?;
        }

        sheet.write_string(r, 4, &row.summary)?;
        sheet.write_string(r, 5, &row.fingerprint)?;
        sheet.write_string(r, 6, &row.ingested_at)?;
    }

    workbook.save(path)?;
    Ok(())
}
