//! Shared domain types and configuration for the fiiwatch pipeline.
//!
//! Everything downstream crates agree on lives here: the run configuration
//! loaded once at process start, the DEPARA fund-code mapping, the document
//! and record types that flow through the pipeline, and the per-run report
//! handed to the notifier.

pub mod app_config;
pub mod config;
pub mod mapping;
pub mod report;
pub mod types;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env, ConfigError};
pub use mapping::{FundMapping, Resolution};
pub use report::{DocumentFailure, FailureStage, RunReport};
pub use types::{
    fingerprint_bytes, DocumentPayload, EventType, ExtractedText, ExtractionQuality, FiiRecord,
    SourceDocument, SourceKind,
};
