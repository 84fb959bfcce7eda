//! Rendering a [`RunReport`] into the email subject and body.

use std::fmt::Write as _;

use fiiwatch_core::RunReport;

/// Subject line encodes run date and outcome, matching what operators have
/// filtered on historically.
#[must_use]
pub fn subject_line(report: &RunReport) -> String {
    let date = report.started_at.date_naive();
    if report.succeeded() {
        format!("FII Report - {date}")
    } else {
        format!("FII Report ERROR - {date}")
    }
}

/// Human-readable run summary. Plain text on purpose: it is read in mail
/// clients, pagers, and grep.
#[must_use]
pub fn render_body(report: &RunReport) -> String {
    let mut body = String::new();

    let _ = writeln!(body, "FII disclosure pipeline run {}", report.run_id);
    let _ = writeln!(body, "Started:  {}", report.started_at.to_rfc3339());
    if let Some(finished) = report.finished_at {
        let _ = writeln!(body, "Finished: {}", finished.to_rfc3339());
    }
    let _ = writeln!(body);

    if let Some(fatal) = &report.fatal {
        let _ = writeln!(body, "RUN FAILED: {fatal}");
        let _ = writeln!(body);
    }

    let _ = writeln!(body, "Documents fetched:    {}", report.fetched);
    let _ = writeln!(body, "Records extracted:    {}", report.extracted);
    let _ = writeln!(body, "Rows appended:        {}", report.recorded);
    let _ = writeln!(body, "Duplicates skipped:   {}", report.duplicates_skipped);
    let _ = writeln!(body, "Failures:             {}", report.failures.len());

    if let Some(path) = &report.ledger_path {
        let _ = writeln!(body, "Ledger:               {}", path.display());
    }

    if !report.unmapped_codes.is_empty() {
        let _ = writeln!(body);
        let _ = writeln!(
            body,
            "Unmapped fund codes (add to DEPARA): {}",
            report.unmapped_codes.join(", ")
        );
    }

    if !report.failures.is_empty() {
        let _ = writeln!(body);
        let _ = writeln!(body, "Failed documents:");
        for failure in &report.failures {
            let fingerprint = failure.fingerprint.as_deref().unwrap_or("-");
            let _ = writeln!(
                body,
                "  [{}] {} stage={} fingerprint={} reason={}",
                failure.source, failure.url, failure.stage, fingerprint, failure.reason
            );
        }
    }

    body
}
