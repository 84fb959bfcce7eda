//! Retry with back-off for the completion endpoint.
//!
//! Only transport-level trouble is retried. Content failures (malformed
//! JSON, schema mismatches, invalid field values) are final: resending the
//! same text produces the same answer.

use std::future::Future;
use std::time::Duration;

use crate::error::ExtractError;

pub(crate) fn is_retriable(err: &ExtractError) -> bool {
    match err {
        ExtractError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        ExtractError::RateLimited { .. } => true,
        ExtractError::UnexpectedStatus { status, .. } => *status >= 500,
        ExtractError::Deserialize { .. }
        | ExtractError::MalformedResponse { .. }
        | ExtractError::InvalidField { .. }
        | ExtractError::NoText { .. } => false,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on
/// transient errors, sleeping `backoff_base_ms * 2^(n-1)` (±25 % jitter,
/// capped at 60 s) before the n-th retry.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, ExtractError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ExtractError>>,
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
                    "transient completion-endpoint error — retrying after back-off"
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
    fn malformed_response_is_not_retriable() {
        assert!(!is_retriable(&ExtractError::MalformedResponse {
            raw: "I am not JSON".to_owned(),
            reason: "expected value".to_owned(),
        }));
    }

    #[test]
    fn rate_limit_is_retriable() {
        assert!(is_retriable(&ExtractError::RateLimited {
            retry_after_secs: 1
        }));
    }

    #[test]
    fn client_error_status_is_not_retriable() {
        assert!(!is_retriable(&ExtractError::UnexpectedStatus {
            status: 400,
            body: "bad request".to_owned(),
        }));
        assert!(is_retriable(&ExtractError::UnexpectedStatus {
            status: 502,
            body: "bad gateway".to_owned(),
        }));
    }

    #[tokio::test]
    async fn content_failures_are_never_retried() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(2, 0, || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ExtractError::MalformedResponse {
                    raw: "nope".to_owned(),
                    reason: "not json".to_owned(),
                })
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(ExtractError::MalformedResponse { .. })));
    }
}
