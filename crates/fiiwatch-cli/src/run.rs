//! One end-to-end pipeline run.
//!
//! Stage order: mapping load (fatal on failure) → both source fetchers
//! concurrently → bounded per-document extraction → single-writer ledger
//! consolidation → watermark save → exactly one notification. Per-document
//! failures aggregate into the run report and never abort siblings; only
//! configuration and consolidation failures are fatal, and even those still
//! produce the error email.

use std::collections::{HashMap, HashSet};

use chrono::{Duration, Utc};
use futures::stream::{self, StreamExt};

use fiiwatch_core::{
    AppConfig, DocumentFailure, DocumentPayload, ExtractionQuality, FailureStage, FiiRecord,
    FundMapping, RunReport, SourceKind,
};
use fiiwatch_extract::{extract_text, ExtractError, ExtractionInput, LlmClient};
use fiiwatch_fetcher::{
    fetch_new_documents, Downloader, FatosRelevantesSource, FetchError, FetchOptions,
    ListingSource, OfertasPublicasSource, Watermark, WatermarkStore, WebDriverClient,
};
use fiiwatch_notify::{load_recipients, render_body, Notifier, SmtpConfig, SmtpNotifier};

const USER_AGENT: &str = "fiiwatch/0.1 (fii-disclosure-pipeline)";

/// Re-fetch one extra day behind the last successful run so documents
/// published around the run boundary are never missed; the fingerprint
/// watermark and ledger dedup absorb the overlap.
const SINCE_OVERLAP_DAYS: i64 = 1;

/// Everything the fetch+extract phases produce, kept separate from the
/// report so the phases can be raced against Ctrl-C without borrowing it.
struct PipelineOutput {
    fetched: usize,
    records: Vec<FiiRecord>,
    failures: Vec<DocumentFailure>,
    unmapped: Vec<String>,
    /// Fingerprints to mark as seen per source once the flush succeeds.
    processed: Vec<(SourceKind, String)>,
}

enum DocumentOutcome {
    Record {
        source: SourceKind,
        fingerprint: String,
        record: FiiRecord,
        unmapped: bool,
    },
    Failure {
        failure: DocumentFailure,
        mark_seen: bool,
    },
}

/// Runs the full pipeline once.
///
/// # Errors
///
/// Returns an error when the run as a whole failed (configuration,
/// consolidation, operator abort). The error email has already been sent by
/// the time this returns.
pub async fn execute(
    config: &AppConfig,
    filter: Option<SourceKind>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let mut report = RunReport::begin();
    tracing::info!(run_id = %report.run_id, env = %config.env, "pipeline run starting");

    // Configuration failures abort before any fetching, but the operator
    // still gets an email — silent failure is never acceptable here.
    let mapping = match FundMapping::load(&config.depara_path) {
        Ok(mapping) => mapping,
        Err(e) => {
            return fail_run(config, report, dry_run, format!("configuration failure: {e}")).await;
        }
    };
    tracing::info!(entries = mapping.len(), "DEPARA mapping loaded");

    let store = WatermarkStore::new(config.watermark_path.clone());
    let mut watermark = match store.load() {
        Ok(watermark) => watermark,
        Err(e) => {
            return fail_run(config, report, dry_run, format!("configuration failure: {e}")).await;
        }
    };

    let output = tokio::select! {
        output = run_pipeline(config, &mapping, &watermark, filter) => match output {
            Ok(output) => output,
            Err(e) => {
                return fail_run(config, report, dry_run, format!("pipeline failure: {e}")).await;
            }
        },
        _ = tokio::signal::ctrl_c() => {
            // In-flight work is abandoned before the flush: the on-disk
            // ledger is untouched.
            return fail_run(
                config,
                report,
                dry_run,
                "run aborted by operator; ledger unchanged".to_string(),
            )
            .await;
        }
    };

    report.fetched = output.fetched;
    report.extracted = output.records.len();
    for failure in output.failures {
        report.push_failure(failure);
    }
    for code in &output.unmapped {
        report.push_unmapped(code);
    }

    if dry_run {
        report.finish();
        tracing::info!("dry run — skipping consolidation, watermark, and notification");
        println!("{}", render_body(&report));
        return Ok(());
    }

    let ledger_path = config.ledger_path.clone();
    let records = output.records;
    let consolidation =
        tokio::task::spawn_blocking(move || fiiwatch_ledger::append_records(&ledger_path, &records))
            .await;

    match consolidation {
        Ok(Ok(result)) => {
            report.recorded = result.appended;
            report.duplicates_skipped = result.duplicates_skipped;
            report.ledger_path = Some(result.path);

            for (source, fingerprints) in group_by_source(output.processed) {
                watermark.mark_processed(source, fingerprints, Utc::now());
            }
            if let Err(e) = store.save(&watermark) {
                // The ledger dedup absorbs the re-fetch this causes; losing
                // the run would be worse.
                tracing::warn!(error = %e, "watermark save failed — next run will re-fetch");
            }
        }
        Ok(Err(e)) => {
            return fail_run(config, report, dry_run, format!("consolidation failure: {e}"))
                .await;
        }
        Err(e) => {
            return fail_run(config, report, dry_run, format!("consolidation task failed: {e}"))
                .await;
        }
    }

    report.finish();
    tracing::info!(
        run_id = %report.run_id,
        fetched = report.fetched,
        recorded = report.recorded,
        failures = report.failures.len(),
        "pipeline run complete"
    );
    send_notification(config, &report).await;
    Ok(())
}

/// Marks the run fatal, notifies, and surfaces the error to the caller.
async fn fail_run(
    config: &AppConfig,
    mut report: RunReport,
    dry_run: bool,
    fatal: String,
) -> anyhow::Result<()> {
    tracing::error!(run_id = %report.run_id, "{fatal}");
    report.fatal = Some(fatal.clone());
    report.finish();
    if !dry_run {
        send_notification(config, &report).await;
    }
    Err(anyhow::anyhow!(fatal))
}

/// Fetch + extract phases. Never fails per-document; only client
/// construction errors propagate.
async fn run_pipeline(
    config: &AppConfig,
    mapping: &FundMapping,
    watermark: &Watermark,
    filter: Option<SourceKind>,
) -> anyhow::Result<PipelineOutput> {
    let driver = WebDriverClient::new(&config.webdriver_url, config.request_timeout_secs)?;
    let downloader = Downloader::new(
        config.request_timeout_secs,
        USER_AGENT,
        config.fetch_max_retries,
        config.fetch_backoff_base_ms,
    )?;
    let llm = LlmClient::new(
        &config.llm_base_url,
        &config.llm_api_key,
        &config.llm_model,
        config.llm_timeout_secs,
        config.llm_max_retries,
        config.llm_backoff_base_ms,
    )?;

    let fatos = FatosRelevantesSource::new(config.fatos_listing_url.clone());
    let ofertas = OfertasPublicasSource::new(config.ofertas_listing_url.clone());

    let run_fatos = filter.is_none() || filter == Some(SourceKind::FatoRelevante);
    let run_ofertas = filter.is_none() || filter == Some(SourceKind::OfertaPublica);

    // The two sources touch disjoint document sets and get independent
    // browser sessions, so they run concurrently.
    let (fatos_result, ofertas_result) = tokio::join!(
        async {
            if run_fatos {
                Some(fetch_source(config, &driver, &downloader, &fatos, watermark).await)
            } else {
                None
            }
        },
        async {
            if run_ofertas {
                Some(fetch_source(config, &driver, &downloader, &ofertas, watermark).await)
            } else {
                None
            }
        },
    );

    let mut failures = Vec::new();
    let mut pending = Vec::new();
    let mut fetched = 0usize;

    for (kind, listing_url, result) in [
        (
            SourceKind::FatoRelevante,
            config.fatos_listing_url.as_str(),
            fatos_result,
        ),
        (
            SourceKind::OfertaPublica,
            config.ofertas_listing_url.as_str(),
            ofertas_result,
        ),
    ] {
        let Some(result) = result else { continue };
        match result {
            Ok(documents) => {
                for document in documents {
                    match document.payload {
                        DocumentPayload::Fetched { bytes, fingerprint } => {
                            fetched += 1;
                            pending.push((
                                document.source,
                                document.url,
                                document.listed_code,
                                fingerprint,
                                bytes,
                            ));
                        }
                        DocumentPayload::Failed { reason } => {
                            failures.push(DocumentFailure {
                                source: document.source,
                                url: document.url,
                                fingerprint: None,
                                stage: FailureStage::Fetch,
                                reason,
                            });
                        }
                    }
                }
            }
            Err(e) => {
                // One source aborting leaves the other's results intact.
                tracing::error!(source = %kind, error = %e, "source listing failed");
                failures.push(DocumentFailure {
                    source: kind,
                    url: listing_url.to_string(),
                    fingerprint: None,
                    stage: FailureStage::Fetch,
                    reason: e.to_string(),
                });
            }
        }
    }

    // Per-document extraction, bounded by the completion endpoint's
    // concurrency budget. Must stay well below anything that would trip its
    // rate limits; the retry policy covers the rest.
    let concurrency = config.extract_concurrency.max(1);
    let llm = &llm;
    let outcomes: Vec<DocumentOutcome> = stream::iter(pending)
        .map(|(source, url, listed_code, fingerprint, bytes)| async move {
            process_document(llm, mapping, source, url, listed_code, fingerprint, bytes).await
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut records = Vec::new();
    let mut unmapped = Vec::new();
    let mut processed = Vec::new();

    for outcome in outcomes {
        match outcome {
            DocumentOutcome::Record {
                source,
                fingerprint,
                record,
                unmapped: is_unmapped,
            } => {
                if is_unmapped {
                    unmapped.push(record.fund_code.clone());
                }
                processed.push((source, fingerprint));
                records.push(record);
            }
            DocumentOutcome::Failure { failure, mark_seen } => {
                if mark_seen {
                    if let Some(fingerprint) = &failure.fingerprint {
                        processed.push((failure.source, fingerprint.clone()));
                    }
                }
                failures.push(failure);
            }
        }
    }

    Ok(PipelineOutput {
        fetched,
        records,
        failures,
        unmapped,
        processed,
    })
}

async fn fetch_source<S: ListingSource>(
    config: &AppConfig,
    driver: &WebDriverClient,
    downloader: &Downloader,
    source: &S,
    watermark: &Watermark,
) -> Result<Vec<fiiwatch_core::SourceDocument>, FetchError> {
    let kind = source.kind();
    let seen: HashSet<String> = watermark.seen(kind);
    let since = watermark
        .last_run(kind)
        .map(|t| t.date_naive() - Duration::days(SINCE_OVERLAP_DAYS));

    let options = FetchOptions {
        since,
        max_pages: config.max_listing_pages,
        max_retries: config.fetch_max_retries,
        backoff_base_ms: config.fetch_backoff_base_ms,
        download_concurrency: config.download_concurrency,
    };
    fetch_new_documents(driver, downloader, source, &seen, options).await
}

/// PDF text extraction followed by structured extraction for one document.
/// The PDF bytes are dropped here, whatever the outcome.
async fn process_document(
    llm: &LlmClient,
    mapping: &FundMapping,
    source: SourceKind,
    url: String,
    listed_code: String,
    fingerprint: String,
    bytes: Vec<u8>,
) -> DocumentOutcome {
    let extracted = extract_text(&fingerprint, &bytes);
    drop(bytes);

    if extracted.quality == ExtractionQuality::Failed {
        return DocumentOutcome::Failure {
            failure: DocumentFailure {
                source,
                url,
                fingerprint: Some(fingerprint),
                stage: FailureStage::PdfExtract,
                reason: "no text layer recovered".to_string(),
            },
            // Deterministic: the same bytes will fail the same way next run.
            mark_seen: true,
        };
    }

    let input = ExtractionInput {
        text: &extracted.text,
        listed_code: &listed_code,
        fingerprint: &fingerprint,
    };

    match llm.extract_record(input, mapping).await {
        Ok(outcome) => DocumentOutcome::Record {
            source,
            fingerprint,
            unmapped: outcome.resolution.is_unmapped(),
            record: outcome.record,
        },
        Err(e) => {
            let mark_seen = is_content_failure(&e);
            DocumentOutcome::Failure {
                failure: DocumentFailure {
                    source,
                    url,
                    fingerprint: Some(fingerprint),
                    stage: FailureStage::LlmExtract,
                    reason: e.to_string(),
                },
                mark_seen,
            }
        }
    }
}

/// Content failures are deterministic — resending the same text will not
/// fix them — so their documents are marked seen and reviewed from the
/// report instead of being re-fetched forever. Transport failures stay
/// unseen and retry on the next run.
fn is_content_failure(err: &ExtractError) -> bool {
    matches!(
        err,
        ExtractError::MalformedResponse { .. }
            | ExtractError::InvalidField { .. }
            | ExtractError::NoText { .. }
    )
}

fn group_by_source(processed: Vec<(SourceKind, String)>) -> HashMap<SourceKind, Vec<String>> {
    let mut grouped: HashMap<SourceKind, Vec<String>> = HashMap::new();
    for (source, fingerprint) in processed {
        grouped.entry(source).or_default().push(fingerprint);
    }
    grouped
}

async fn send_notification(config: &AppConfig, report: &RunReport) {
    let recipients = match load_recipients(&config.mailing_path) {
        Ok(recipients) => recipients,
        Err(e) => {
            tracing::warn!(error = %e, "mailing list unreadable, using sender fallback");
            Vec::new()
        }
    };

    let from = config
        .smtp_user
        .clone()
        .unwrap_or_else(|| "fiiwatch@localhost".to_string());
    let notifier = SmtpNotifier::new(SmtpConfig {
        host: config.smtp_host.clone(),
        port: config.smtp_port,
        user: config.smtp_user.clone(),
        password: config.smtp_password.clone(),
        from,
        recipients,
    });

    let attachment = if report.succeeded() {
        report.ledger_path.clone()
    } else {
        None
    };
    let report = report.clone();

    let sent =
        tokio::task::spawn_blocking(move || notifier.notify(&report, attachment.as_deref())).await;
    match sent {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "failed to deliver run report"),
        Err(e) => tracing::error!(error = %e, "notification task panicked"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_failures_are_marked_seen() {
        assert!(is_content_failure(&ExtractError::MalformedResponse {
            raw: "prose".to_string(),
            reason: "not json".to_string(),
        }));
        assert!(is_content_failure(&ExtractError::NoText {
            fingerprint: "fp".to_string(),
        }));
    }

    #[test]
    fn transport_failures_are_retried_next_run() {
        assert!(!is_content_failure(&ExtractError::RateLimited {
            retry_after_secs: 30
        }));
        assert!(!is_content_failure(&ExtractError::UnexpectedStatus {
            status: 502,
            body: "bad gateway".to_string(),
        }));
    }

    #[test]
    fn group_by_source_splits_fingerprints() {
        let grouped = group_by_source(vec![
            (SourceKind::FatoRelevante, "a".to_string()),
            (SourceKind::OfertaPublica, "b".to_string()),
            (SourceKind::FatoRelevante, "c".to_string()),
        ]);
        assert_eq!(grouped[&SourceKind::FatoRelevante], vec!["a", "c"]);
        assert_eq!(grouped[&SourceKind::OfertaPublica], vec!["b"]);
    }
}
