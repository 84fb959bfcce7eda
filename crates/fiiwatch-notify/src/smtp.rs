//! SMTP notifier.
//!
//! The only transport implementation of [`Notifier`]. STARTTLS relay with
//! optional credentials, matching the Office 365 / Gmail setups the
//! pipeline has been pointed at.

use std::path::Path;

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use fiiwatch_core::RunReport;

use crate::error::NotifyError;
use crate::report::{render_body, subject_line};

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Delivers one run's report. Implementations must not be called more than
/// once per run; the orchestrator owns that discipline.
pub trait Notifier {
    /// Sends the report, attaching the ledger when given.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] if composition or transport fails; the caller
    /// logs this — there is no further fallback channel.
    fn notify(&self, report: &RunReport, attachment: Option<&Path>) -> Result<(), NotifyError>;
}

/// SMTP connection settings, resolved from the app config.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub from: String,
    /// Explicit recipients; when empty, the report goes back to `from`.
    pub recipients: Vec<String>,
}

pub struct SmtpNotifier {
    config: SmtpConfig,
}

impl SmtpNotifier {
    #[must_use]
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
        address.parse().map_err(|e| NotifyError::Address {
            address: address.to_string(),
            reason: format!("{e}"),
        })
    }

    fn build_message(
        &self,
        report: &RunReport,
        attachment: Option<&Path>,
    ) -> Result<Message, NotifyError> {
        let from = Self::parse_mailbox(&self.config.from)?;

        let mut builder = Message::builder()
            .from(from.clone())
            .subject(subject_line(report));

        if self.config.recipients.is_empty() {
            builder = builder.to(from);
        } else {
            for address in &self.config.recipients {
                builder = builder.to(Self::parse_mailbox(address)?);
            }
        }

        let body = render_body(report);

        let message = match attachment {
            Some(path) => {
                let bytes = std::fs::read(path).map_err(|e| NotifyError::AttachmentIo {
                    path: path.display().to_string(),
                    source: e,
                })?;
                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "fii_ledger.xlsx".to_string());
                let content_type =
                    ContentType::parse(XLSX_MIME).map_err(|e| NotifyError::Address {
                        address: XLSX_MIME.to_string(),
                        reason: format!("invalid attachment content type: {e}"),
                    })?;
                builder.multipart(
                    MultiPart::mixed()
                        .singlepart(SinglePart::plain(body))
                        .singlepart(Attachment::new(filename).body(bytes, content_type)),
                )?
            }
            None => builder.body(body)?,
        };

        Ok(message)
    }
}

impl Notifier for SmtpNotifier {
    fn notify(&self, report: &RunReport, attachment: Option<&Path>) -> Result<(), NotifyError> {
        let message = self.build_message(report, attachment)?;

        let mut transport = SmtpTransport::starttls_relay(&self.config.host)?
            .port(self.config.port);
        if let (Some(user), Some(password)) = (&self.config.user, &self.config.password) {
            transport = transport.credentials(Credentials::new(user.clone(), password.clone()));
        }
        let mailer = transport.build();

        mailer.send(&message)?;
        tracing::info!(
            run_id = %report.run_id,
            recipients = self.config.recipients.len().max(1),
            "run report delivered"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            user: None,
            password: None,
            from: "pipeline@example.com".to_string(),
            recipients: vec!["ops@example.com".to_string()],
        }
    }

    #[test]
    fn builds_plain_message_without_attachment() {
        let notifier = SmtpNotifier::new(config());
        let report = RunReport::begin();
        let message = notifier.build_message(&report, None).unwrap();
        let rendered = String::from_utf8(message.formatted()).unwrap();
        assert!(rendered.contains("FII Report - "));
        assert!(rendered.contains("ops@example.com"));
    }

    #[test]
    fn attaches_ledger_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fii_ledger.xlsx");
        std::fs::write(&path, b"not really xlsx but bytes").unwrap();

        let notifier = SmtpNotifier::new(config());
        let report = RunReport::begin();
        let message = notifier.build_message(&report, Some(&path)).unwrap();
        let rendered = String::from_utf8(message.formatted()).unwrap();
        assert!(rendered.contains("fii_ledger.xlsx"));
        assert!(rendered.contains("multipart/mixed"));
    }

    #[test]
    fn empty_recipient_list_falls_back_to_sender() {
        let mut cfg = config();
        cfg.recipients.clear();
        let notifier = SmtpNotifier::new(cfg);
        let report = RunReport::begin();
        let message = notifier.build_message(&report, None).unwrap();
        let rendered = String::from_utf8(message.formatted()).unwrap();
        assert!(rendered.contains("pipeline@example.com"));
    }

    #[test]
    fn invalid_from_address_is_typed_error() {
        let mut cfg = config();
        cfg.from = "not an address".to_string();
        let notifier = SmtpNotifier::new(cfg);
        let report = RunReport::begin();
        let result = notifier.build_message(&report, None);
        assert!(matches!(result, Err(NotifyError::Address { .. })));
    }
}
