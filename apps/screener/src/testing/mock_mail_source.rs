use std::sync::Mutex;

use async_trait::async_trait;

use crate::mail::{MailError, MailSource};
use crate::models::resume::AttachmentPayload;

enum Behaviour {
    Unconfigured,
    Serve(Vec<AttachmentPayload>),
    Fail,
}

/// Mailbox returning a fixed attachment list and recording each fetch's
/// `fetch_all` flag.
pub struct MockMailSource {
    behaviour: Behaviour,
    fetches: Mutex<Vec<bool>>,
}

impl MockMailSource {
    pub fn with(attachments: Vec<AttachmentPayload>) -> Self {
        Self::new(Behaviour::Serve(attachments))
    }

    pub fn unconfigured() -> Self {
        Self::new(Behaviour::Unconfigured)
    }

    pub fn failing() -> Self {
        Self::new(Behaviour::Fail)
    }

    fn new(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            fetches: Mutex::new(Vec::new()),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.lock().expect("fetch log poisoned").len()
    }

    pub fn last_fetch_all(&self) -> Option<bool> {
        self.fetches.lock().expect("fetch log poisoned").last().copied()
    }
}

#[async_trait]
impl MailSource for MockMailSource {
    fn is_configured(&self) -> bool {
        !matches!(self.behaviour, Behaviour::Unconfigured)
    }

    async fn fetch_recent(
        &self,
        limit: usize,
        fetch_all: bool,
    ) -> Result<Vec<AttachmentPayload>, MailError> {
        self.fetches.lock().expect("fetch log poisoned").push(fetch_all);
        match &self.behaviour {
            Behaviour::Serve(attachments) if fetch_all => Ok(attachments.clone()),
            Behaviour::Serve(attachments) => Ok(attachments.iter().take(limit).cloned().collect()),
            Behaviour::Unconfigured => Ok(Vec::new()),
            Behaviour::Fail => Err(MailError::Auth("invalid_client".to_string())),
        }
    }
}
