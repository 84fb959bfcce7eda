//! Mailing-list workbook.
//!
//! Column A of the first sheet holds recipient addresses, one per row. A
//! missing file is not an error — the caller falls back to the sender
//! address so a run never goes unreported.

use std::path::Path;

use calamine::{open_workbook_auto, DataType, Reader};

use crate::error::NotifyError;

/// Loads recipient addresses. Non-address cells (headers, notes) are
/// skipped; order is preserved; duplicates removed.
///
/// # Errors
///
/// [`NotifyError::MailingRead`] if the file exists but cannot be read.
pub fn load_recipients(path: &Path) -> Result<Vec<String>, NotifyError> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "no mailing workbook, using sender fallback");
        return Ok(Vec::new());
    }
    let display = path.display().to_string();

    let mut workbook = open_workbook_auto(path).map_err(|e| NotifyError::MailingRead {
        path: display.clone(),
        reason: e.to_string(),
    })?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| NotifyError::MailingRead {
            path: display.clone(),
            reason: "workbook has no sheets".to_string(),
        })?
        .map_err(|e| NotifyError::MailingRead {
            path: display,
            reason: e.to_string(),
        })?;

    let mut recipients = Vec::new();
    for row in range.rows() {
        let Some(cell) = row.first().and_then(DataType::as_string) else {
            continue;
        };
        let address = cell.trim().to_string();
        if address.contains('@') && !recipients.contains(&address) {
            recipients.push(address);
        }
    }
    Ok(recipients)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_workbook_is_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let recipients = load_recipients(&dir.path().join("absent.xlsx")).unwrap();
        assert!(recipients.is_empty());
    }

    #[test]
    fn reads_addresses_skipping_header_and_duplicates() {
        use rust_xlsxwriter::Workbook;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mailing.xlsx");

        let mut wb = Workbook::new();
        let ws = wb.add_worksheet();
        ws.write_string(0, 0, "email").unwrap();
        ws.write_string(1, 0, "ops@example.com").unwrap();
        ws.write_string(2, 0, "gestor@example.com").unwrap();
        ws.write_string(3, 0, "ops@example.com").unwrap();
        wb.save(&path).unwrap();

        let recipients = load_recipients(&path).unwrap();
        assert_eq!(recipients, vec!["ops@example.com", "gestor@example.com"]);
    }
}
