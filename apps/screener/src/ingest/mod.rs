//! Ingestion pipeline and the policies it applies after each score write.

pub mod automation;
pub mod matcher;
mod pipeline;

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::mail::MailSource;

pub use pipeline::{Ingestor, RescoreError};

/// Fetches recent mail attachments and ingests them against every active job.
/// An unconfigured mailbox is a no-op.
pub async fn poll_mailbox(
    ingestor: &Ingestor,
    mail: &dyn MailSource,
    limit: usize,
    fetch_all: bool,
) -> Result<usize> {
    if !mail.is_configured() {
        warn!("Mailbox credentials not configured; skipping mail ingest");
        return Ok(0);
    }

    let attachments = mail
        .fetch_recent(limit, fetch_all)
        .await
        .context("Failed to fetch mailbox")?;
    info!("Fetched {} attachment(s) from mailbox", attachments.len());

    ingestor.ingest(attachments, None).await
}

/// Polls the mailbox every `interval` until Ctrl-C. Only the first pass
/// follows pagination when `initial_full` is set.
pub async fn watch_mailbox(
    ingestor: &Ingestor,
    mail: &dyn MailSource,
    limit: usize,
    interval: Duration,
    initial_full: bool,
) -> Result<()> {
    let mut first_pass = true;
    loop {
        let fetch_all = initial_full && first_pass;
        match poll_mailbox(ingestor, mail, limit, fetch_all).await {
            Ok(saved) => info!("Mail pass complete: {saved} resume(s) saved"),
            Err(e) => error!("Mail pass failed: {e:#}"),
        }
        first_pass = false;

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping mailbox watch");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::IngestConfig;
    use crate::evaluator::Evaluator;
    use crate::extraction::TextExtractor;
    use crate::models::resume::ResumeSource;
    use crate::store::ScreeningStore;
    use crate::testing::fixtures::{attachment, job_with_criteria};
    use crate::testing::{MemoryBlobStore, MemoryStore, MockMailSource};

    fn ingestor(store: Arc<MemoryStore>) -> Ingestor {
        Ingestor::new(
            store,
            Arc::new(MemoryBlobStore::new()),
            Evaluator::new(None),
            TextExtractor::default(),
            IngestConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_unconfigured_mailbox_is_skipped() {
        let store = Arc::new(MemoryStore::new());
        let mail = MockMailSource::unconfigured();

        let saved = poll_mailbox(&ingestor(store.clone()), &mail, 5, false).await.unwrap();

        assert_eq!(saved, 0);
        assert_eq!(mail.fetches(), 0);
    }

    #[tokio::test]
    async fn test_poll_ingests_against_active_jobs() {
        let store = Arc::new(MemoryStore::new());
        store.add_job(job_with_criteria(1, &["Terraform"]));
        let mail = MockMailSource::with(vec![
            attachment("msg-1", "a.txt", ResumeSource::Email, "Cloud engineer: Terraform, AWS, Azure, six years of infrastructure work."),
            attachment("msg-2", "b.txt", ResumeSource::Email, "Frontend developer: React, TypeScript and accessibility audits for banks."),
        ]);

        let saved = poll_mailbox(&ingestor(store.clone()), &mail, 5, true).await.unwrap();

        assert_eq!(saved, 2);
        assert_eq!(mail.fetches(), 1);
        assert_eq!(mail.last_fetch_all(), Some(true));
        assert_eq!(store.list_scores(Some(1)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_mail_errors_propagate() {
        let store = Arc::new(MemoryStore::new());
        let mail = MockMailSource::failing();

        assert!(poll_mailbox(&ingestor(store), &mail, 5, false).await.is_err());
    }
}
