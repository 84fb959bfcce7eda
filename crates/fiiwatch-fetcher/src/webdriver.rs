//! Minimal W3C WebDriver wire client.
//!
//! Speaks just enough of the protocol for the listing fetchers: session
//! create/delete, navigation, CSS element lookup, element text/attribute
//! reads, and synchronous script execution. Driver *provisioning* is out of
//! scope — the endpoint URL points at an already-running chromedriver or
//! Selenium instance.
//!
//! Built like the other HTTP clients in this workspace: injectable base URL
//! so tests can stand up a wiremock server instead of a real browser.

use std::time::Duration;

use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::FetchError;

/// Chrome arguments for unattended runs. Mirrors the flag set the scheduled
/// deployment has always used; harmless locally.
const HEADLESS_ARGS: &[&str] = &[
    "--headless=new",
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--window-size=1920,1080",
];

#[derive(Deserialize)]
struct WireEnvelope<T> {
    value: T,
}

#[derive(Deserialize)]
struct WireError {
    error: String,
    message: String,
}

#[derive(Deserialize)]
struct NewSessionValue {
    #[serde(rename = "sessionId")]
    session_id: String,
}

/// Client for a WebDriver endpoint.
pub struct WebDriverClient {
    http: Client,
    base_url: Url,
}

impl WebDriverClient {
    /// Creates a client for the given endpoint (e.g. `http://127.0.0.1:9515`).
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`FetchError::MalformedLink`] if `base_url`
    /// does not parse.
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| FetchError::MalformedLink {
            url: base_url.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self { http, base_url })
    }

    /// Starts a new headless-Chrome session.
    ///
    /// # Errors
    ///
    /// [`FetchError::WebDriver`] if the endpoint rejects the session request,
    /// [`FetchError::Http`] on network failure.
    pub async fn new_session(&self) -> Result<WebDriverSession<'_>, FetchError> {
        let body = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": HEADLESS_ARGS }
                }
            }
        });
        let value: NewSessionValue = self.post("session", &body).await?;
        Ok(WebDriverSession {
            driver: self,
            id: value.session_id,
        })
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, FetchError> {
        let url = self.endpoint(path);
        let response = self.http.post(url).json(body).send().await?;
        Self::decode(path, response).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let url = self.endpoint(path);
        let response = self.http.get(url).send().await?;
        Self::decode(path, response).await
    }

    async fn delete(&self, path: &str) -> Result<(), FetchError> {
        let url = self.endpoint(path);
        let response = self.http.delete(url).send().await?;
        Self::decode::<Value>(path, response).await?;
        Ok(())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Decodes a wire response, mapping the protocol's error envelope to
    /// [`FetchError::WebDriver`].
    async fn decode<T: DeserializeOwned>(
        command: &str,
        response: reqwest::Response,
    ) -> Result<T, FetchError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            if let Ok(envelope) = serde_json::from_str::<WireEnvelope<WireError>>(&body) {
                return Err(FetchError::WebDriver {
                    command: command.to_owned(),
                    kind: envelope.value.error,
                    message: envelope.value.message,
                });
            }
            return Err(FetchError::WebDriver {
                command: command.to_owned(),
                kind: "unknown error".to_owned(),
                message: format!("status {status}: {body}"),
            });
        }

        let envelope: WireEnvelope<T> =
            serde_json::from_str(&body).map_err(|e| FetchError::Deserialize {
                context: format!("webdriver {command}"),
                source: e,
            })?;
        Ok(envelope.value)
    }
}

/// One live browser session. Dropping without [`WebDriverSession::close`]
/// leaks the remote browser until the driver reaps it.
pub struct WebDriverSession<'a> {
    driver: &'a WebDriverClient,
    id: String,
}

impl WebDriverSession<'_> {
    /// Navigates the session to `url`.
    ///
    /// # Errors
    ///
    /// [`FetchError::WebDriver`] on navigation failure (bad URL, page load
    /// timeout), [`FetchError::Http`] on network failure to the driver.
    pub async fn navigate(&self, url: &str) -> Result<(), FetchError> {
        let path = format!("session/{}/url", self.id);
        let _: Value = self.driver.post(&path, &json!({ "url": url })).await?;
        Ok(())
    }

    /// Finds elements by CSS selector, returning opaque element ids.
    ///
    /// An empty `Vec` is not an error — callers decide whether a missing
    /// element means layout drift.
    ///
    /// # Errors
    ///
    /// [`FetchError::WebDriver`] if the selector is invalid or the session
    /// is gone.
    pub async fn find_elements(&self, css: &str) -> Result<Vec<String>, FetchError> {
        let path = format!("session/{}/elements", self.id);
        let body = json!({ "using": "css selector", "value": css });
        let raw: Vec<serde_json::Map<String, Value>> = self.driver.post(&path, &body).await?;
        Ok(raw
            .into_iter()
            .filter_map(|m| {
                m.into_iter()
                    .next()
                    .and_then(|(_, v)| v.as_str().map(str::to_owned))
            })
            .collect())
    }

    /// Reads an element's rendered text.
    ///
    /// # Errors
    ///
    /// [`FetchError::WebDriver`] if the element went stale.
    pub async fn element_text(&self, element_id: &str) -> Result<String, FetchError> {
        let path = format!("session/{}/element/{element_id}/text", self.id);
        self.driver.get(&path).await
    }

    /// Reads an element attribute (e.g. `href`). `None` when unset.
    ///
    /// # Errors
    ///
    /// [`FetchError::WebDriver`] if the element went stale.
    pub async fn element_attribute(
        &self,
        element_id: &str,
        name: &str,
    ) -> Result<Option<String>, FetchError> {
        let path = format!(
            "session/{}/element/{element_id}/attribute/{name}",
            self.id
        );
        self.driver.get(&path).await
    }

    /// Executes a synchronous script in the page and returns its value.
    ///
    /// # Errors
    ///
    /// [`FetchError::WebDriver`] on script errors or timeouts.
    pub async fn execute(&self, script: &str) -> Result<Value, FetchError> {
        let path = format!("session/{}/execute/sync", self.id);
        let body = json!({ "script": script, "args": [] });
        self.driver.post(&path, &body).await
    }

    /// Executes a script and deserializes its JSON return value.
    ///
    /// # Errors
    ///
    /// [`FetchError::Deserialize`] if the script's return value does not
    /// match `T`; script errors as in [`WebDriverSession::execute`].
    pub async fn execute_parsed<T: DeserializeOwned>(
        &self,
        context: &str,
        script: &str,
    ) -> Result<T, FetchError> {
        let value = self.execute(script).await?;
        serde_json::from_value(value).map_err(|e| FetchError::Deserialize {
            context: format!("script result for {context}"),
            source: e,
        })
    }

    /// Ends the session, releasing the remote browser.
    ///
    /// # Errors
    ///
    /// [`FetchError::WebDriver`] / [`FetchError::Http`] if the delete call
    /// fails; callers typically log and continue.
    pub async fn close(self) -> Result<(), FetchError> {
        let path = format!("session/{}", self.id);
        self.driver.delete(&path).await
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}
