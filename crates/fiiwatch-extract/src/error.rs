use thiserror::Error;

/// Errors from the structured (LLM) extraction stage.
///
/// PDF text extraction never errors — it degrades to
/// `ExtractionQuality::Failed` instead (see [`crate::pdf`]).
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("completion endpoint rate limited (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("unexpected HTTP status {status} from completion endpoint: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The model replied, but not with the JSON object the prompt demands.
    /// The raw reply is preserved for manual review.
    #[error("model response does not match the extraction schema: {reason}")]
    MalformedResponse { raw: String, reason: String },

    /// A schema-valid response carried an unusable field value.
    #[error("invalid {field} in model response: {reason} (raw: {raw})")]
    InvalidField {
        field: &'static str,
        reason: String,
        raw: String,
    },

    /// Extraction was asked to run on text that never survived the PDF
    /// stage. Guard against misuse; the pipeline skips such documents.
    #[error("document {fingerprint} has no extractable text")]
    NoText { fingerprint: String },
}

impl ExtractError {
    /// The raw model payload, when this failure preserved one.
    #[must_use]
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            ExtractError::MalformedResponse { raw, .. }
            | ExtractError::InvalidField { raw, .. } => Some(raw),
            _ => None,
        }
    }
}
