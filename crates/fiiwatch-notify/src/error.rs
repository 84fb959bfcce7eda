use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid email address \"{address}\": {reason}")]
    Address { address: String, reason: String },

    #[error("cannot build email message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP transport error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("cannot read attachment {path}: {source}")]
    AttachmentIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read mailing workbook {path}: {reason}")]
    MailingRead { path: String, reason: String },
}
