//! PDF-to-text extraction.
//!
//! Disclosure PDFs arrive in every state of disrepair: broken xref tables,
//! half-encrypted bodies, pages with no text layer. This stage never raises
//! past its boundary — the worst outcome is an [`ExtractedText`] with
//! `quality: Failed`, which the pipeline records and skips.
//!
//! Primary parser is `pdf-extract`; when it errors (or panics, which it does
//! on some malformed xref tables) a `lopdf` page-by-page pass runs as the
//! fallback before giving up.

use std::panic::{catch_unwind, AssertUnwindSafe};

use fiiwatch_core::{ExtractedText, ExtractionQuality};

/// Below this many characters the text layer is treated as partial: enough
/// to try extraction on, not enough to trust as the full document.
const MIN_FULL_TEXT_CHARS: usize = 200;

/// Extracts a best-effort plain-text representation of `bytes`.
///
/// Never fails: structurally unreadable documents come back with empty text
/// and `quality: Failed`. Parser warnings about malformed internals are
/// expected noise and not surfaced.
#[must_use]
pub fn extract_text(fingerprint: &str, bytes: &[u8]) -> ExtractedText {
    // pdf-extract panics on some corrupt inputs rather than returning Err;
    // contain it so one bad filing cannot take down the run.
    let primary = catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem(bytes)
    }));

    let (text, degraded) = match primary {
        Ok(Ok(text)) => (text, false),
        Ok(Err(e)) => {
            tracing::debug!(fingerprint, error = %e, "primary PDF parser failed, trying fallback");
            (fallback_text(bytes), true)
        }
        Err(_) => {
            tracing::debug!(fingerprint, "primary PDF parser panicked, trying fallback");
            (fallback_text(bytes), true)
        }
    };

    let trimmed = text.trim();
    let quality = if trimmed.is_empty() {
        ExtractionQuality::Failed
    } else if degraded || trimmed.chars().count() < MIN_FULL_TEXT_CHARS {
        ExtractionQuality::Partial
    } else {
        ExtractionQuality::Full
    };

    if quality == ExtractionQuality::Failed {
        tracing::warn!(fingerprint, "no text layer recovered from document");
    }

    ExtractedText {
        fingerprint: fingerprint.to_string(),
        text: trimmed.to_string(),
        quality,
    }
}

/// Page-by-page `lopdf` pass. Pages that fail individually are skipped so a
/// single broken page does not void the rest of the document.
fn fallback_text(bytes: &[u8]) -> String {
    let doc = match lopdf::Document::load_mem(bytes) {
        Ok(doc) => doc,
        Err(_) => return String::new(),
    };
    if doc.is_encrypted() {
        return String::new();
    }

    let mut out = String::new();
    for page_number in doc.get_pages().keys() {
        match doc.extract_text(&[*page_number]) {
            Ok(page_text) => {
                out.push_str(&page_text);
                out.push('\n');
            }
            Err(_) => {
                tracing::debug!(page = page_number, "fallback parser skipped page");
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// Builds a small single-page PDF containing `text`.
    fn sample_pdf(text: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![100.into(), 600.into()]),
                Operation::new("Tj", vec![Object::string_literal(text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode content stream"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut buf = Vec::new();
        doc.save_to(&mut buf).expect("serialize sample pdf");
        buf
    }

    #[test]
    fn extracts_text_from_wellformed_pdf() {
        let bytes = sample_pdf("Distribuicao de R$ 0,50 por cota em 2024-05-10");
        let extracted = extract_text("fp-ok", &bytes);
        assert_ne!(extracted.quality, ExtractionQuality::Failed);
        assert!(
            extracted.text.contains("0,50"),
            "expected amount in extracted text, got: {:?}",
            extracted.text
        );
    }

    #[test]
    fn short_text_is_partial_quality() {
        let bytes = sample_pdf("curto");
        let extracted = extract_text("fp-short", &bytes);
        assert_eq!(extracted.quality, ExtractionQuality::Partial);
    }

    #[test]
    fn truncated_bytes_fail_without_panicking() {
        let mut bytes = sample_pdf("este documento sera truncado");
        bytes.truncate(40);
        let extracted = extract_text("fp-truncated", &bytes);
        assert_eq!(extracted.quality, ExtractionQuality::Failed);
        assert!(extracted.text.is_empty());
        assert_eq!(extracted.fingerprint, "fp-truncated");
    }

    #[test]
    fn garbage_bytes_fail_cleanly() {
        let extracted = extract_text("fp-garbage", b"this was never a pdf");
        assert_eq!(extracted.quality, ExtractionQuality::Failed);
    }

    #[test]
    fn empty_input_fails_cleanly() {
        let extracted = extract_text("fp-empty", b"");
        assert_eq!(extracted.quality, ExtractionQuality::Failed);
    }
}
