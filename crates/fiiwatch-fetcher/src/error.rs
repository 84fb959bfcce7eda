use thiserror::Error;

/// Errors produced while listing or downloading disclosure documents.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The WebDriver endpoint rejected a command. `kind` is the wire-protocol
    /// error string (e.g. `"stale element reference"`, `"timeout"`).
    #[error("WebDriver {command} failed: {kind}: {message}")]
    WebDriver {
        command: String,
        kind: String,
        message: String,
    },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rate limited by {url} (retry after {retry_after_secs}s)")]
    RateLimited { url: String, retry_after_secs: u64 },

    #[error("document not found: {url}")]
    NotFound { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("malformed document link \"{url}\": {reason}")]
    MalformedLink { url: String, reason: String },

    /// The listing page no longer matches the selectors this crate knows.
    #[error("listing layout drift on {source_name}: {reason}")]
    ListingDrift { source_name: String, reason: String },

    #[error("cannot access watermark file {path}: {source}")]
    WatermarkIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("watermark file {path} is corrupt: {source}")]
    WatermarkParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
