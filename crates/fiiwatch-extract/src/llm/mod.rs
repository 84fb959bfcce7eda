//! Client for the language-model completion endpoint.
//!
//! Sends one document's text with the fixed extraction prompt and parses
//! the reply into a typed record. Wraps `reqwest` with typed error handling
//! and an injectable base URL so tests run against wiremock.

mod prompt;
mod schema;

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use fiiwatch_core::{FiiRecord, FundMapping, Resolution};

use crate::error::ExtractError;
use crate::retry::retry_with_backoff;
use prompt::{build_user_prompt, SYSTEM_PROMPT};
use schema::validate_content;

/// Everything the extractor needs about one document besides its text.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionInput<'a> {
    pub text: &'a str,
    /// Ticker from the listing page; fallback when the model's `fund_code`
    /// has no DEPARA entry.
    pub listed_code: &'a str,
    pub fingerprint: &'a str,
}

/// A typed record plus how its fund code resolved, so the caller can report
/// unmapped codes without re-deriving them.
#[derive(Debug)]
pub struct ExtractionOutcome {
    pub record: FiiRecord,
    pub resolution: Resolution,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Client for an OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct LlmClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl LlmClient {
    /// Creates a client with configured timeout and retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout_secs: u64,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, ExtractError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_retries,
            backoff_base_ms,
        })
    }

    /// Extracts a typed [`FiiRecord`] from one document's text.
    ///
    /// The model's `fund_code` is resolved through the DEPARA mapping; when
    /// it has no entry, the listing-page ticker is tried before falling back
    /// to the unmapped sentinel. Rate limits and 5xx responses are retried
    /// up to the configured budget; content failures never are.
    ///
    /// # Errors
    ///
    /// - [`ExtractError::NoText`] — called with empty text.
    /// - [`ExtractError::MalformedResponse`] / [`ExtractError::InvalidField`]
    ///   — reply unusable, raw payload preserved.
    /// - [`ExtractError::RateLimited`] / [`ExtractError::UnexpectedStatus`] /
    ///   [`ExtractError::Http`] — transport failure after retries.
    pub async fn extract_record(
        &self,
        input: ExtractionInput<'_>,
        mapping: &FundMapping,
    ) -> Result<ExtractionOutcome, ExtractError> {
        if input.text.trim().is_empty() {
            return Err(ExtractError::NoText {
                fingerprint: input.fingerprint.to_string(),
            });
        }

        let user_prompt = build_user_prompt(input.text, input.listed_code);
        let prompt = user_prompt.as_str();

        let content = retry_with_backoff(self.max_retries, self.backoff_base_ms, || async move {
            self.request_completion(prompt).await
        })
        .await?;

        let fields = validate_content(&content)?;

        // Prefer the code the model read out of the document; the listing
        // ticker is the backstop for garbled headers.
        let resolution = match mapping.resolve(&fields.fund_code) {
            Resolution::Unmapped { .. } if !input.listed_code.trim().is_empty() => {
                mapping.resolve(input.listed_code)
            }
            resolved => resolved,
        };

        let record = FiiRecord {
            fund_code: resolution.ledger_code(),
            event_type: fields.event_type,
            event_date: fields.event_date,
            monetary_amount: fields.monetary_amount,
            summary: fields.summary,
            source_fingerprint: input.fingerprint.to_string(),
            ingested_at: chrono::Utc::now(),
            date_flagged: fields.date_flagged,
        };

        Ok(ExtractionOutcome { record, resolution })
    }

    async fn request_completion(&self, user_prompt: &str) -> Result<String, ExtractError> {
        let request = ChatRequest {
            model: &self.model,
            temperature: 0.0,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(30);
            return Err(ExtractError::RateLimited { retry_after_secs });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|e| ExtractError::Deserialize {
                context: "chat completion response".to_string(),
                source: e,
            })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(ExtractError::MalformedResponse {
                raw: body,
                reason: "response carried no choices".to_string(),
            })
    }
}
