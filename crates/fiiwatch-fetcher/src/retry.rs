//! Retry with exponential back-off and jitter for fetcher operations.
//!
//! Transient conditions (network failures, 5xx, rate limiting, flaky browser
//! elements) are retried; permanent ones (404, malformed links, layout
//! drift, corrupt watermark) are returned immediately.

use std::future::Future;
use std::time::Duration;

use crate::error::FetchError;

/// WebDriver wire-protocol error strings that indicate a flaky session
/// rather than a broken page.
const TRANSIENT_WEBDRIVER_KINDS: &[&str] = &[
    "timeout",
    "script timeout",
    "stale element reference",
    "unknown error",
];

/// Returns `true` for errors worth retrying after a back-off delay.
///
/// **Retriable:**
/// - Network-level failures: timeout, connection reset.
/// - HTTP 429 and 5xx responses.
/// - Flaky WebDriver conditions (timeouts, stale elements).
///
/// **Not retriable (hard stop):**
/// - [`FetchError::NotFound`] / [`FetchError::MalformedLink`] — retrying
///   returns the same result.
/// - [`FetchError::ListingDrift`] — the selectors are wrong, not the network.
/// - [`FetchError::Deserialize`] and watermark errors — data problems.
pub(crate) fn is_retriable(err: &FetchError) -> bool {
    match err {
        FetchError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        FetchError::RateLimited { .. } => true,
        FetchError::UnexpectedStatus { status, .. } => *status >= 500,
        FetchError::WebDriver { kind, .. } => {
            TRANSIENT_WEBDRIVER_KINDS.contains(&kind.as_str())
        }
        FetchError::NotFound { .. }
        | FetchError::MalformedLink { .. }
        | FetchError::ListingDrift { .. }
        | FetchError::Deserialize { .. }
        | FetchError::WatermarkIo { .. }
        | FetchError::WatermarkParse { .. } => false,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on
/// transient errors.
///
/// The wait before the n-th retry is `backoff_base_ms * 2^(n-1)` with
/// ±25 % jitter, capped at 60 s. Non-retriable errors are returned
/// immediately.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    const MAX_DELAY_MS: u64 = 60_000;
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "transient fetch error — retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_not_retriable() {
        assert!(!is_retriable(&FetchError::NotFound {
            url: "https://example.invalid/x.pdf".to_owned()
        }));
    }

    #[test]
    fn malformed_link_is_not_retriable() {
        assert!(!is_retriable(&FetchError::MalformedLink {
            url: "not-a-url".to_owned(),
            reason: "relative URL without a base".to_owned(),
        }));
    }

    #[test]
    fn listing_drift_is_not_retriable() {
        assert!(!is_retriable(&FetchError::ListingDrift {
            source_name: "fatos_relevantes".to_owned(),
            reason: "document table not found".to_owned(),
        }));
    }

    #[test]
    fn stale_element_is_retriable() {
        assert!(is_retriable(&FetchError::WebDriver {
            command: "execute/sync".to_owned(),
            kind: "stale element reference".to_owned(),
            message: "element is not attached".to_owned(),
        }));
    }

    #[test]
    fn webdriver_no_such_element_is_not_retriable() {
        assert!(!is_retriable(&FetchError::WebDriver {
            command: "elements".to_owned(),
            kind: "no such element".to_owned(),
            message: "unable to locate".to_owned(),
        }));
    }

    #[test]
    fn server_error_status_is_retriable() {
        assert!(is_retriable(&FetchError::UnexpectedStatus {
            status: 503,
            url: "https://example.invalid".to_owned(),
        }));
        assert!(!is_retriable(&FetchError::UnexpectedStatus {
            status: 403,
            url: "https://example.invalid".to_owned(),
        }));
    }

    #[tokio::test]
    async fn does_not_retry_permanent_failures() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(FetchError::NotFound {
                    url: "https://example.invalid/x.pdf".to_owned(),
                })
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1, "404 must not be retried");
        assert!(matches!(result, Err(FetchError::NotFound { .. })));
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(3, 0, || {
            let c = Arc::clone(&c);
            async move {
                let attempt = c.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt < 3 {
                    Err(FetchError::RateLimited {
                        url: "https://example.invalid".to_owned(),
                        retry_after_secs: 0,
                    })
                } else {
                    Ok(99)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
