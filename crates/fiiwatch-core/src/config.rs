use std::path::PathBuf;

use thiserror::Error;

use crate::app_config::{AppConfig, Environment};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("cannot read mapping workbook {path}: {reason}")]
    MappingRead { path: String, reason: String },

    #[error("mapping workbook {path} is unusable: {reason}")]
    MappingShape { path: String, reason: String },
}

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files — useful for testing
/// or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// This is the core parsing/validation logic, decoupled from the actual environment
/// so it can be tested with a pure `HashMap` lookup — no `set_var`/`remove_var` needed.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default =
        |var: &str, default: &str| -> String { lookup(var).unwrap_or_else(|_| default.to_string()) };

    let parse_u16 = |var: &str, default: &str| -> Result<u16, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u16>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let env = parse_environment(&or_default("FIIWATCH_ENV", "local"));

    // Automated runs keep everything under the workspace; local runs default
    // to a data directory the operator can override per path.
    let base = match env {
        Environment::Automated => PathBuf::from("."),
        Environment::Local => PathBuf::from("./data"),
    };

    let path_or = |var: &str, default: PathBuf| -> PathBuf {
        lookup(var).map_or(default, PathBuf::from)
    };

    let depara_path = path_or("FIIWATCH_DEPARA_PATH", base.join("config/DEPARA-FIIs.xlsx"));
    let ledger_path = path_or(
        "FIIWATCH_LEDGER_PATH",
        base.join("output/fii_ledger.xlsx"),
    );
    let watermark_path = path_or(
        "FIIWATCH_WATERMARK_PATH",
        base.join("output/watermark.json"),
    );
    let mailing_path = path_or("FIIWATCH_MAILING_PATH", base.join("config/mailing.xlsx"));

    let llm_api_key = require("FIIWATCH_LLM_API_KEY")?;

    Ok(AppConfig {
        env,
        log_level: or_default("FIIWATCH_LOG_LEVEL", "info"),
        depara_path,
        ledger_path,
        watermark_path,
        mailing_path,
        webdriver_url: or_default("FIIWATCH_WEBDRIVER_URL", "http://127.0.0.1:9515"),
        fatos_listing_url: or_default(
            "FIIWATCH_FATOS_URL",
            "https://fnet.bmfbovespa.com.br/fnet/publico/abrirGerenciadorDocumentosCVM?tipoFundo=1",
        ),
        ofertas_listing_url: or_default(
            "FIIWATCH_OFERTAS_URL",
            "https://sistemaswebb3-listados.b3.com.br/offerDistributionPage/",
        ),
        llm_base_url: or_default("FIIWATCH_LLM_BASE_URL", "https://api.openai.com"),
        llm_api_key,
        llm_model: or_default("FIIWATCH_LLM_MODEL", "gpt-4o-mini"),
        smtp_host: or_default("FIIWATCH_SMTP_HOST", "smtp.office365.com"),
        smtp_port: parse_u16("FIIWATCH_SMTP_PORT", "587")?,
        smtp_user: lookup("FIIWATCH_SMTP_USER").ok(),
        smtp_password: lookup("FIIWATCH_SMTP_PASSWORD").ok(),
        request_timeout_secs: parse_u64("FIIWATCH_REQUEST_TIMEOUT_SECS", "30")?,
        llm_timeout_secs: parse_u64("FIIWATCH_LLM_TIMEOUT_SECS", "60")?,
        fetch_max_retries: parse_u32("FIIWATCH_FETCH_MAX_RETRIES", "3")?,
        fetch_backoff_base_ms: parse_u64("FIIWATCH_FETCH_BACKOFF_BASE_MS", "1000")?,
        llm_max_retries: parse_u32("FIIWATCH_LLM_MAX_RETRIES", "2")?,
        llm_backoff_base_ms: parse_u64("FIIWATCH_LLM_BACKOFF_BASE_MS", "1000")?,
        download_concurrency: parse_usize("FIIWATCH_DOWNLOAD_CONCURRENCY", "3")?,
        extract_concurrency: parse_usize("FIIWATCH_EXTRACT_CONCURRENCY", "4")?,
        max_listing_pages: parse_usize("FIIWATCH_MAX_LISTING_PAGES", "20")?,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Local`. `GITHUB_ACTIONS=true`
/// deployments set `FIIWATCH_ENV=automated` explicitly.
fn parse_environment(s: &str) -> Environment {
    match s {
        "automated" => Environment::Automated,
        _ => Environment::Local,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::env::VarError;

    use super::*;

    fn lookup_from_map<'a>(
        map: &'a HashMap<&'a str, &'a str>,
    ) -> impl Fn(&str) -> Result<String, VarError> + 'a {
        move |key| {
            map.get(key)
                .map(|v| (*v).to_string())
                .ok_or(VarError::NotPresent)
        }
    }

    /// Returns a map with all required env vars populated with valid defaults.
    fn full_env<'a>() -> HashMap<&'a str, &'a str> {
        let mut m = HashMap::new();
        m.insert("FIIWATCH_LLM_API_KEY", "sk-test");
        m
    }

    #[test]
    fn parse_environment_local() {
        assert_eq!(parse_environment("local"), Environment::Local);
    }

    #[test]
    fn parse_environment_automated() {
        assert_eq!(parse_environment("automated"), Environment::Automated);
    }

    #[test]
    fn parse_environment_unknown_defaults_to_local() {
        assert_eq!(parse_environment("anything-else"), Environment::Local);
    }

    #[test]
    fn build_app_config_fails_without_llm_api_key() {
        let map: HashMap<&str, &str> = HashMap::new();
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::MissingEnvVar(ref v)) if v == "FIIWATCH_LLM_API_KEY"),
            "expected MissingEnvVar(FIIWATCH_LLM_API_KEY), got: {result:?}"
        );
    }

    #[test]
    fn build_app_config_fails_with_invalid_smtp_port() {
        let mut map = full_env();
        map.insert("FIIWATCH_SMTP_PORT", "not-a-port");
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "FIIWATCH_SMTP_PORT"),
            "expected InvalidEnvVar(FIIWATCH_SMTP_PORT), got: {result:?}"
        );
    }

    #[test]
    fn build_app_config_succeeds_with_defaults() {
        let map = full_env();
        let result = build_app_config(lookup_from_map(&map));
        assert!(result.is_ok(), "expected Ok, got: {result:?}");
        let cfg = result.unwrap();
        assert_eq!(cfg.env, Environment::Local);
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.smtp_port, 587);
        assert_eq!(cfg.fetch_max_retries, 3);
        assert_eq!(cfg.fetch_backoff_base_ms, 1_000);
        assert_eq!(cfg.llm_max_retries, 2);
        assert_eq!(cfg.download_concurrency, 3);
        assert_eq!(cfg.extract_concurrency, 4);
        assert!(cfg.smtp_user.is_none());
        assert_eq!(
            cfg.depara_path,
            PathBuf::from("./data/config/DEPARA-FIIs.xlsx")
        );
    }

    #[test]
    fn automated_env_moves_paths_to_workspace() {
        let mut map = full_env();
        map.insert("FIIWATCH_ENV", "automated");
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        assert_eq!(cfg.env, Environment::Automated);
        assert_eq!(cfg.ledger_path, PathBuf::from("./output/fii_ledger.xlsx"));
    }

    #[test]
    fn explicit_paths_override_environment_defaults() {
        let mut map = full_env();
        map.insert("FIIWATCH_ENV", "automated");
        map.insert("FIIWATCH_LEDGER_PATH", "/srv/fii/ledger.xlsx");
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        assert_eq!(cfg.ledger_path, PathBuf::from("/srv/fii/ledger.xlsx"));
    }
}
