/// File attached to an outbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: mime::Mime,
    pub bytes: Vec<u8>,
}

/// Structured message; MIME assembly belongs to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MailError {
    /// Transient transport failure; safe to retry.
    #[error("mail transport unavailable: {0}")]
    Transport(String),
    #[error("mail rejected: {0}")]
    Rejected(String),
}

impl MailError {
    pub fn is_transient(&self) -> bool {
        matches!(self, MailError::Transport(_))
    }
}

pub trait Mailer: Send + Sync {
    fn send(&self, email: &OutboundEmail) -> Result<(), MailError>;
}
