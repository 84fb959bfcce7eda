//! Fatos Relevantes listing (FNET document manager).
//!
//! The page is a server-rendered DataTables grid: one `<tr>` per filing with
//! the fund ticker in the second column, the publication date in the fifth,
//! and the document link in the last. Pagination is a "next" button that
//! DataTables disables on the final page.

use fiiwatch_core::SourceKind;

use crate::error::FetchError;
use crate::sources::{parse_rows, DocumentLink, ListingSource, RawListingRow};
use crate::webdriver::WebDriverSession;

const TABLE_SELECTOR: &str = "#tblDocumentosEnviados";

const EXTRACT_ROWS_SCRIPT: &str = r"
    return Array.from(document.querySelectorAll('#tblDocumentosEnviados tbody tr')).map(function (tr) {
        var link = tr.querySelector('a[href]');
        var cells = tr.querySelectorAll('td');
        return {
            url: link ? link.href : '',
            code: cells.length > 1 ? cells[1].innerText.trim() : '',
            date: cells.length > 4 ? cells[4].innerText.trim() : ''
        };
    });
";

const NEXT_PAGE_SCRIPT: &str = r"
    var next = document.querySelector('#tblDocumentosEnviados_next');
    if (!next || next.classList.contains('disabled')) { return false; }
    var anchor = next.querySelector('a') || next;
    anchor.click();
    return true;
";

pub struct FatosRelevantesSource {
    listing_url: String,
}

impl FatosRelevantesSource {
    #[must_use]
    pub fn new(listing_url: impl Into<String>) -> Self {
        Self {
            listing_url: listing_url.into(),
        }
    }
}

impl ListingSource for FatosRelevantesSource {
    fn kind(&self) -> SourceKind {
        SourceKind::FatoRelevante
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

        if session.find_elements(TABLE_SELECTOR).await?.is_empty() {
            return Err(FetchError::ListingDrift {
                source_name: self.kind().to_string(),
                reason: format!("document table {TABLE_SELECTOR} not found"),
            });
        }

        let mut links = Vec::new();
        for page in 0..max_pages.max(1) {
            let rows: Vec<RawListingRow> = session
                .execute_parsed("fatos listing rows", EXTRACT_ROWS_SCRIPT)
                .await?;
            tracing::debug!(page, count = rows.len(), "fatos listing page scraped");
            links.extend(parse_rows(self.kind(), &self.listing_url, rows));

            let advanced: bool = session
                .execute_parsed("fatos next page", NEXT_PAGE_SCRIPT)
                .await?;
            if !advanced {
                break;
            }
        }

        Ok(links)
    }
}
