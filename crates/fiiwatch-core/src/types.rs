//! Pipeline domain types.
//!
//! A filing flows through the pipeline as `SourceDocument` (raw bytes) →
//! `ExtractedText` (best-effort plain text) → `FiiRecord` (typed ledger row).
//! Each step only keeps a fingerprint back-reference to the previous one, so
//! PDF bytes are dropped as soon as text extraction has run.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Which disclosure feed a document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    FatoRelevante,
    OfertaPublica,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::FatoRelevante => write!(f, "fatos_relevantes"),
            SourceKind::OfertaPublica => write!(f, "ofertas_publicas"),
        }
    }
}

/// Lowercase hex SHA-256 of a document's raw bytes.
///
/// This is the dedup key across runs, so it must stay stable: any change
/// here orphans every watermark and ledger row already written.
#[must_use]
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Outcome of downloading one discovered filing.
#[derive(Debug, Clone)]
pub enum DocumentPayload {
    Fetched { bytes: Vec<u8>, fingerprint: String },
    Failed { reason: String },
}

/// One discovered filing, as yielded by a source fetcher.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub source: SourceKind,
    pub url: String,
    /// Fund ticker as it appeared on the listing page (raw, un-normalized).
    pub listed_code: String,
    /// Publication date from the listing page, when the page carried one.
    pub published: Option<NaiveDate>,
    pub discovered_at: DateTime<Utc>,
    pub payload: DocumentPayload,
}

impl SourceDocument {
    /// Fingerprint of the downloaded bytes, if the download succeeded.
    #[must_use]
    pub fn fingerprint(&self) -> Option<&str> {
        match &self.payload {
            DocumentPayload::Fetched { fingerprint, .. } => Some(fingerprint),
            DocumentPayload::Failed { .. } => None,
        }
    }
}

/// How much of the PDF text layer survived extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionQuality {
    Full,
    Partial,
    Failed,
}

/// Best-effort plain text for one document. Holds a fingerprint
/// back-reference, never the bytes themselves.
#[derive(Debug, Clone)]
pub struct ExtractedText {
    pub fingerprint: String,
    pub text: String,
    pub quality: ExtractionQuality,
}

/// Classified disclosure event. The closed set mirrors what the extraction
/// prompt allows; anything else survives as `Other` with its raw label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    Distribution,
    Offering,
    Incorporation,
    Amortization,
    Other(String),
}

impl EventType {
    /// Parse the model's `event_type` string. Unknown labels are preserved,
    /// not rejected — classification drift must not lose the record.
    #[must_use]
    pub fn from_model_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "distribution" => EventType::Distribution,
            "offering" => EventType::Offering,
            "incorporation" => EventType::Incorporation,
            "amortization" => EventType::Amortization,
            other => EventType::Other(other.to_string()),
        }
    }

    /// Canonical string stored in the ledger's `event_type` column.
    #[must_use]
    pub fn as_ledger_label(&self) -> String {
        match self {
            EventType::Distribution => "distribution".to_string(),
            EventType::Offering => "offering".to_string(),
            EventType::Incorporation => "incorporation".to_string(),
            EventType::Amortization => "amortization".to_string(),
            EventType::Other(label) => format!("other:{label}"),
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ledger_label())
    }
}

/// The canonical unit of the ledger. Never mutated after persistence.
#[derive(Debug, Clone)]
pub struct FiiRecord {
    /// Canonical fund identifier via the DEPARA mapping, or the
    /// `UNMAPPED:<RAW>` sentinel when the listing code had no entry.
    pub fund_code: String,
    pub event_type: EventType,
    pub event_date: NaiveDate,
    pub monetary_amount: Option<Decimal>,
    pub summary: String,
    pub source_fingerprint: String,
    pub ingested_at: DateTime<Utc>,
    /// Set when `event_date` fell outside the plausible range; the record is
    /// kept for operator review rather than discarded.
    pub date_flagged: bool,
}
