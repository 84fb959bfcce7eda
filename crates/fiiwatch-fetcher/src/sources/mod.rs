//! Listing-page sources.
//!
//! One module per disclosure feed. Every CSS selector and page-structure
//! assumption is confined to these modules behind the [`ListingSource`]
//! seam: `list documents`, then a shared download step. Layout drift becomes
//! a typed [`FetchError::ListingDrift`], never a crash.

mod fatos;
mod ofertas;

pub use fatos::FatosRelevantesSource;
pub use ofertas::OfertasPublicasSource;

use std::collections::HashSet;

use chrono::{NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use serde::Deserialize;

use fiiwatch_core::{fingerprint_bytes, DocumentPayload, SourceDocument, SourceKind};

use crate::download::Downloader;
use crate::error::FetchError;
use crate::retry::retry_with_backoff;
use crate::webdriver::{WebDriverClient, WebDriverSession};

/// One row scraped from a listing page, before download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentLink {
    pub url: String,
    pub listed_code: String,
    pub published: Option<NaiveDate>,
}

/// Raw row shape returned by the in-page extraction scripts.
#[derive(Debug, Deserialize)]
pub(crate) struct RawListingRow {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub date: String,
}

/// A disclosure feed the fetcher knows how to enumerate.
pub trait ListingSource {
    fn kind(&self) -> SourceKind;
    fn listing_url(&self) -> &str;

    /// Enumerates document links from the listing page. The session is
    /// already navigated-capable; implementations drive pagination or
    /// scrolling themselves, bounded by `max_pages`.
    async fn list_documents(
        &self,
        session: &WebDriverSession<'_>,
        max_pages: usize,
    ) -> Result<Vec<DocumentLink>, FetchError>;
}

/// Knobs for one source fetch, owned by the caller's config.
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    pub since: Option<NaiveDate>,
    pub max_pages: usize,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub download_concurrency: usize,
}

/// Fetches all new documents for one source.
///
/// Opens a fresh browser session per listing attempt (retried with back-off
/// on transient failures), filters rows against `options.since` and the
/// `seen` fingerprint set, and downloads the remaining documents with a
/// small worker pool. Individual download failures become
/// [`DocumentPayload::Failed`] entries; only a listing failure after all
/// retries aborts the source.
///
/// # Errors
///
/// Returns [`FetchError`] when the listing page cannot be enumerated after
/// the retry budget — the caller records this as a source-level failure and
/// continues with the other source.
pub async fn fetch_new_documents<S: ListingSource>(
    driver: &WebDriverClient,
    downloader: &Downloader,
    source: &S,
    seen: &HashSet<String>,
    options: FetchOptions,
) -> Result<Vec<SourceDocument>, FetchError> {
    let kind = source.kind();

    let links = retry_with_backoff(options.max_retries, options.backoff_base_ms, || async move {
        let session = driver.new_session().await?;
        let result = source.list_documents(&session, options.max_pages).await;
        if let Err(e) = session.close().await {
            tracing::debug!(source = %kind, error = %e, "session close failed");
        }
        result
    })
    .await?;

    let fresh: Vec<DocumentLink> = links
        .into_iter()
        .filter(|link| match (options.since, link.published) {
            (Some(since), Some(published)) => published >= since,
            // Keep undated rows: the fingerprint check still dedups them.
            _ => true,
        })
        .collect();

    tracing::info!(source = %kind, count = fresh.len(), "listing enumerated");

    let concurrency = options.download_concurrency.max(1);
    let documents: Vec<SourceDocument> = stream::iter(fresh)
        .map(|link| async move {
            let discovered_at = Utc::now();
            let payload = match downloader.download(&link.url).await {
                Ok(bytes) => {
                    let fingerprint = fingerprint_bytes(&bytes);
                    if seen.contains(&fingerprint) {
                        tracing::debug!(source = %kind, url = %link.url, "already processed, skipping");
                        return None;
                    }
                    DocumentPayload::Fetched { bytes, fingerprint }
                }
                Err(e) => {
                    tracing::warn!(source = %kind, url = %link.url, error = %e, "document download failed");
                    DocumentPayload::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            Some(SourceDocument {
                source: kind,
                url: link.url,
                listed_code: link.listed_code,
                published: link.published,
                discovered_at,
                payload,
            })
        })
        .buffer_unordered(concurrency)
        .filter_map(|doc| async move { doc })
        .collect()
        .await;

    Ok(documents)
}

/// Converts scraped rows into [`DocumentLink`]s, resolving relative URLs
/// against the listing page. Rows without a link are dropped with a warning;
/// unparseable dates survive as `None` so the document is still processed.
pub(crate) fn parse_rows(
    kind: SourceKind,
    listing_url: &str,
    rows: Vec<RawListingRow>,
) -> Vec<DocumentLink> {
    let base = reqwest::Url::parse(listing_url).ok();

    rows.into_iter()
        .filter_map(|row| {
            if row.url.trim().is_empty() {
                tracing::warn!(source = %kind, code = %row.code, "listing row without link, dropped");
                return None;
            }
            let url = resolve_url(base.as_ref(), row.url.trim());
            Some(DocumentLink {
                url,
                listed_code: row.code.trim().to_string(),
                published: parse_listing_date(&row.date),
            })
        })
        .collect()
}

fn resolve_url(base: Option<&reqwest::Url>, raw: &str) -> String {
    if raw.starts_with("http://") || raw.starts_with("https://") {
        return raw.to_string();
    }
    match base.and_then(|b| b.join(raw).ok()) {
        Some(joined) => joined.to_string(),
        // Kept as-is: the downloader turns it into a recorded MalformedLink
        // failure for this document only.
        None => raw.to_string(),
    }
}

/// Listing pages use pt-BR `dd/mm/yyyy`; some embed ISO dates in `time`
/// elements. Anything else is treated as unknown.
pub(crate) fn parse_listing_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d"))
        .ok()
}
