//! Ofertas Públicas listing (B3 offer distribution page).
//!
//! Unlike the FNET grid this is a client-rendered feed of offer cards that
//! grows as the page scrolls. Enumeration scrolls to the bottom until the
//! card count stops growing (or the page budget runs out), then extracts
//! every card in one pass.

use fiiwatch_core::SourceKind;

use crate::error::FetchError;
use crate::sources::{parse_rows, DocumentLink, ListingSource, RawListingRow};
use crate::webdriver::WebDriverSession;

const CARD_SELECTOR: &str = "div.offer-card, li.offer-item";

const EXTRACT_CARDS_SCRIPT: &str = r"
    return Array.from(document.querySelectorAll('div.offer-card, li.offer-item')).map(function (el) {
        var link = el.querySelector('a[href]');
        var code = el.querySelector('.ticker, .fund-code');
        var date = el.querySelector('time, .date');
        return {
            url: link ? link.href : '',
            code: code ? code.innerText.trim() : '',
            date: date ? date.innerText.trim() : ''
        };
    });
";

const SCROLL_SCRIPT: &str = r"
    window.scrollTo(0, document.body.scrollHeight);
    return document.querySelectorAll('div.offer-card, li.offer-item').length;
";

pub struct OfertasPublicasSource {
    listing_url: String,
}

impl OfertasPublicasSource {
    #[must_use]
    pub fn new(listing_url: impl Into<String>) -> Self {
        Self {
            listing_url: listing_url.into(),
        }
    }
}

impl ListingSource for OfertasPublicasSource {
    fn kind(&self) -> SourceKind {
        SourceKind::OfertaPublica
    }

    fn listing_url(&self) -> &str {
        &self.listing_url
    }

    async fn list_documents(
        &self,
        session: &WebDriverSession<'_>,
        max_pages: usize,
    ) -> Result<Vec<DocumentLink>, FetchError> {
        session.navigate(&self.listing_url).await?;

        if session.find_elements(CARD_SELECTOR).await?.is_empty() {
            return Err(FetchError::ListingDrift {
                source_name: self.kind().to_string(),
                reason: format!("no offer cards matching {CARD_SELECTOR}"),
            });
        }

        let mut previous_count: u64 = 0;
        for round in 0..max_pages.max(1) {
            let count: u64 = session
                .execute_parsed("ofertas scroll", SCROLL_SCRIPT)
                .await?;
            tracing::debug!(round, count, "ofertas feed scrolled");
            if count <= previous_count {
                break;
            }
            previous_count = count;
        }

        let rows: Vec<RawListingRow> = session
            .execute_parsed("ofertas cards", EXTRACT_CARDS_SCRIPT)
            .await?;
        Ok(parse_rows(self.kind(), &self.listing_url, rows))
    }
}
