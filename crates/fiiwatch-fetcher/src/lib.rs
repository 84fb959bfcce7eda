//! Source fetchers for the fiiwatch pipeline.
//!
//! Drives a WebDriver session against each disclosure listing page,
//! enumerates new filings, and downloads their PDF bytes. All DOM selectors
//! live inside [`sources`] — layout drift on the exchange pages must never
//! require changes outside this crate.

pub mod download;
pub mod error;
pub mod sources;
pub mod watermark;
pub mod webdriver;

mod retry;

pub use download::Downloader;
pub use error::FetchError;
pub use sources::{
    fetch_new_documents, DocumentLink, FatosRelevantesSource, FetchOptions, ListingSource,
    OfertasPublicasSource,
};
pub use watermark::{Watermark, WatermarkStore};
pub use webdriver::{WebDriverClient, WebDriverSession};
