use std::path::PathBuf;

/// Execution environment, selecting default data paths.
///
/// `Automated` covers scheduled CI runs (the original deployment target);
/// `Local` is an operator workstation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Local,
    Automated,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Local => write!(f, "local"),
            Environment::Automated => write!(f, "automated"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,

    /// DEPARA fund-code mapping workbook. Required; the run aborts if absent.
    pub depara_path: PathBuf,
    /// Consolidated ledger workbook (created on first run).
    pub ledger_path: PathBuf,
    /// JSON watermark state file (seen fingerprints per source).
    pub watermark_path: PathBuf,
    /// Mailing-list workbook; optional, falls back to the sender address.
    pub mailing_path: PathBuf,

    /// W3C WebDriver endpoint (e.g. a locally running chromedriver).
    pub webdriver_url: String,
    pub fatos_listing_url: String,
    pub ofertas_listing_url: String,

    pub llm_base_url: String,
    pub llm_api_key: String,
    pub llm_model: String,

    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,

    pub request_timeout_secs: u64,
    pub llm_timeout_secs: u64,
    pub fetch_max_retries: u32,
    pub fetch_backoff_base_ms: u64,
    pub llm_max_retries: u32,
    pub llm_backoff_base_ms: u64,
    pub download_concurrency: usize,
    pub extract_concurrency: usize,
    pub max_listing_pages: usize,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("depara_path", &self.depara_path)
            .field("ledger_path", &self.ledger_path)
            .field("watermark_path", &self.watermark_path)
            .field("mailing_path", &self.mailing_path)
            .field("webdriver_url", &self.webdriver_url)
            .field("fatos_listing_url", &self.fatos_listing_url)
            .field("ofertas_listing_url", &self.ofertas_listing_url)
            .field("llm_base_url", &self.llm_base_url)
            .field("llm_api_key", &"[redacted]")
            .field("llm_model", &self.llm_model)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_user", &self.smtp_user)
            .field(
                "smtp_password",
                &self.smtp_password.as_ref().map(|_| "[redacted]"),
            )
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("llm_timeout_secs", &self.llm_timeout_secs)
            .field("fetch_max_retries", &self.fetch_max_retries)
            .field("fetch_backoff_base_ms", &self.fetch_backoff_base_ms)
            .field("llm_max_retries", &self.llm_max_retries)
            .field("llm_backoff_base_ms", &self.llm_backoff_base_ms)
            .field("download_concurrency", &self.download_concurrency)
            .field("extract_concurrency", &self.extract_concurrency)
            .field("max_listing_pages", &self.max_listing_pages)
            .finish()
    }
}
