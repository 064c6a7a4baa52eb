//! Mailbox polling: recent messages with resume-like attachments.

mod graph;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::resume::AttachmentPayload;

pub use graph::GraphMailSource;

/// Attachment extensions worth ingesting.
pub const ALLOWED_EXTENSIONS: &[&str] = &[".pdf", ".txt", ".docx", ".doc"];

#[derive(Debug, Error)]
pub enum MailError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("token request failed: {0}")]
    Auth(String),

    #[error("invalid mailbox URL: {0}")]
    Url(String),

    #[error("unexpected response shape: {0}")]
    Parse(#[from] serde_json::Error),
}

#[async_trait]
pub trait MailSource: Send + Sync {
    /// True when credentials are present. An unconfigured source yields no
    /// attachments rather than an error.
    fn is_configured(&self) -> bool;

    /// Attachments of the most recent messages, newest first per page.
    /// `fetch_all` follows pagination past `limit`.
    async fn fetch_recent(
        &self,
        limit: usize,
        fetch_all: bool,
    ) -> Result<Vec<AttachmentPayload>, MailError>;
}

pub fn is_allowed_attachment(name: &str) -> bool {
    let lower = name.to_lowercase();
    ALLOWED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_allow_list() {
        assert!(is_allowed_attachment("CV.PDF"));
        assert!(is_allowed_attachment("resume.docx"));
        assert!(is_allowed_attachment("old.doc"));
        assert!(!is_allowed_attachment("photo.png"));
        assert!(!is_allowed_attachment("invite.ics"));
    }
}
