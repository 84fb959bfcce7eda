//! Strict schema validation of the model's JSON payload.
//!
//! A response either becomes a fully-typed set of fields or a typed
//! failure carrying the raw payload — a record with unset required fields
//! cannot exist past this module.

use chrono::{Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use fiiwatch_core::EventType;

use crate::error::ExtractError;

/// Earliest event date considered plausible; FII disclosures predating the
/// e-filing system do not reach this pipeline.
const MIN_PLAUSIBLE_YEAR: i32 = 2000;
/// Events may be scheduled ahead, but not decades ahead.
const MAX_FUTURE_DAYS: i64 = 730;

/// The exact object shape the prompt demands. `deny_unknown_fields` turns
/// schema drift in the model's output into a typed failure instead of
/// silently accepting extra keys.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ModelPayload {
    pub fund_code: String,
    pub event_type: String,
    pub event_date: String,
    pub monetary_amount: Option<f64>,
    pub summary_text: String,
}

/// Validated, typed extraction fields, ready to become a `FiiRecord`.
#[derive(Debug)]
pub(crate) struct ValidatedFields {
    pub fund_code: String,
    pub event_type: EventType,
    pub event_date: NaiveDate,
    pub date_flagged: bool,
    pub monetary_amount: Option<Decimal>,
    pub summary: String,
}

/// Parses and validates the model's message content.
///
/// # Errors
///
/// - [`ExtractError::MalformedResponse`] — content is not a JSON object of
///   the expected shape (raw content preserved).
/// - [`ExtractError::InvalidField`] — shape matched but a value is unusable
///   (unparseable date, non-finite amount, empty summary).
pub(crate) fn validate_content(content: &str) -> Result<ValidatedFields, ExtractError> {
    let stripped = strip_code_fence(content);

    let payload: ModelPayload =
        serde_json::from_str(stripped).map_err(|e| ExtractError::MalformedResponse {
            raw: content.to_string(),
            reason: e.to_string(),
        })?;

    let event_date = NaiveDate::parse_from_str(payload.event_date.trim(), "%Y-%m-%d").map_err(
        |e| ExtractError::InvalidField {
            field: "event_date",
            reason: format!("not an ISO date: {e}"),
            raw: content.to_string(),
        },
    )?;
    let date_flagged = !is_plausible_date(event_date, Utc::now().date_naive());

    let monetary_amount = match payload.monetary_amount {
        None => None,
        Some(v) => Some(Decimal::from_f64_retain(v).ok_or_else(|| {
            ExtractError::InvalidField {
                field: "monetary_amount",
                reason: format!("not a finite number: {v}"),
                raw: content.to_string(),
            }
        })?),
    };

    let summary = payload.summary_text.trim().to_string();
    if summary.is_empty() {
        return Err(ExtractError::InvalidField {
            field: "summary_text",
            reason: "empty summary".to_string(),
            raw: content.to_string(),
        });
    }

    Ok(ValidatedFields {
        fund_code: payload.fund_code.trim().to_string(),
        event_type: EventType::from_model_label(&payload.event_type),
        event_date,
        date_flagged,
        monetary_amount,
        summary,
    })
}

fn is_plausible_date(date: NaiveDate, today: NaiveDate) -> bool {
    date.year() >= MIN_PLAUSIBLE_YEAR && date <= today + Duration::days(MAX_FUTURE_DAYS)
}

/// Models occasionally wrap JSON in markdown fences despite instructions.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}
