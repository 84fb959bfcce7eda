//! Text and field extraction for the fiiwatch pipeline.
//!
//! Two stages live here: turning downloaded PDF bytes into best-effort plain
//! text ([`pdf`]), and turning that text into a typed [`fiiwatch_core::FiiRecord`]
//! via a language-model completion endpoint ([`llm`]). Neither stage lets a
//! malformed document past its boundary as anything other than a typed,
//! per-document failure.

pub mod error;
pub mod llm;
pub mod pdf;

mod retry;

pub use error::ExtractError;
pub use llm::{ExtractionInput, ExtractionOutcome, LlmClient};
pub use pdf::extract_text;
