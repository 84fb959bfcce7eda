//! PDF document downloads.
//!
//! Documents are fetched directly over HTTP — the browser session is only
//! used to discover links, never to shuttle bytes.

use std::time::Duration;

use reqwest::Client;

use crate::error::FetchError;
use crate::retry::retry_with_backoff;

/// Downloads grow unbounded on misbehaving servers without a cap. 50 MiB is
/// an order of magnitude above the largest filing observed.
const MAX_DOCUMENT_BYTES: usize = 50 * 1024 * 1024;

/// HTTP downloader with retry policy for transient failures.
pub struct Downloader {
    client: Client,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl Downloader {
    /// Creates a `Downloader` with configured timeout, `User-Agent`, and
    /// retry policy. `max_retries` counts additional attempts after the
    /// first failure; `0` disables retries.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            max_retries,
            backoff_base_ms,
        })
    }

    /// Downloads one document, returning its raw bytes.
    ///
    /// # Errors
    ///
    /// - [`FetchError::MalformedLink`] — URL does not parse (not retried).
    /// - [`FetchError::NotFound`] — HTTP 404 (not retried).
    /// - [`FetchError::RateLimited`] — HTTP 429 after all retries.
    /// - [`FetchError::UnexpectedStatus`] — other non-2xx (5xx retried).
    /// - [`FetchError::Http`] — network failure after all retries.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| FetchError::MalformedLink {
            url: url.to_owned(),
            reason: e.to_string(),
        })?;

        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let parsed = parsed.clone();
            async move {
                let response = self.client.get(parsed).send().await?;
                let status = response.status();

                if status == reqwest::StatusCode::NOT_FOUND {
                    return Err(FetchError::NotFound {
                        url: url.to_owned(),
                    });
                }
                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    let retry_after_secs = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .unwrap_or(60);
                    return Err(FetchError::RateLimited {
                        url: url.to_owned(),
                        retry_after_secs,
                    });
                }
                if !status.is_success() {
                    return Err(FetchError::UnexpectedStatus {
                        status: status.as_u16(),
                        url: url.to_owned(),
                    });
                }

                let bytes = response.bytes().await?;
                if bytes.len() > MAX_DOCUMENT_BYTES {
                    return Err(FetchError::MalformedLink {
                        url: url.to_owned(),
                        reason: format!("document exceeds {MAX_DOCUMENT_BYTES} bytes"),
                    });
                }
                Ok(bytes.to_vec())
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_downloader() -> Downloader {
        Downloader::new(5, "fiiwatch-test/0.1", 0, 0).expect("failed to build test Downloader")
    }

    #[tokio::test]
    async fn download_returns_bytes_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/doc.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.7 stub".to_vec()))
            .mount(&server)
            .await;

        let bytes = test_downloader()
            .download(&format!("{}/doc.pdf", server.uri()))
            .await
            .unwrap();
        assert_eq!(bytes, b"%PDF-1.7 stub");
    }

    #[tokio::test]
    async fn download_maps_404_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.pdf"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = test_downloader()
            .download(&format!("{}/missing.pdf", server.uri()))
            .await;
        assert!(matches!(result, Err(FetchError::NotFound { .. })));
    }

    #[tokio::test]
    async fn download_rejects_malformed_url_without_request() {
        let result = test_downloader().download("::not a url::").await;
        assert!(matches!(result, Err(FetchError::MalformedLink { .. })));
    }

    #[tokio::test]
    async fn download_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky.pdf"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
            .mount(&server)
            .await;

        let downloader =
            Downloader::new(5, "fiiwatch-test/0.1", 2, 0).expect("failed to build Downloader");
        let bytes = downloader
            .download(&format!("{}/flaky.pdf", server.uri()))
            .await
            .unwrap();
        assert_eq!(bytes, b"ok");
    }
}
