use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::models::resume::Resume;
use crate::store::ScreeningStore;

/// How an existing record was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Same `(batch_id, attachment_name)`: the attachment was seen before.
    Submission,
    /// Same person by email, sender address, or phone.
    Contact,
}

/// Resolves an incoming attachment to an existing candidate record.
///
/// Phone-only matches can join two people who share a number (e.g. a
/// recruiter's desk line).
#[derive(Clone)]
pub struct CandidateMatcher {
    store: Arc<dyn ScreeningStore>,
}

impl CandidateMatcher {
    pub fn new(store: Arc<dyn ScreeningStore>) -> Self {
        Self { store }
    }

    pub async fn find(
        &self,
        batch_id: &str,
        attachment_name: &str,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Option<(Resume, MatchKind)>> {
        if let Some(existing) = self.store.find_by_submission(batch_id, attachment_name).await? {
            debug!("{attachment_name}: same submission as resume {}", existing.id);
            return Ok(Some((existing, MatchKind::Submission)));
        }

        let email = email.map(str::trim).filter(|e| !e.is_empty());
        let phone = phone.map(str::trim).filter(|p| !p.is_empty());
        if email.is_none() && phone.is_none() {
            return Ok(None);
        }

        Ok(self
            .store
            .find_by_contact(email, phone)
            .await?
            .map(|resume| {
                debug!("{attachment_name}: matched resume {} by contact", resume.id);
                (resume, MatchKind::Contact)
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::new_resume;
    use crate::testing::MemoryStore;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_no_terms_no_match() {
        let store = Arc::new(MemoryStore::new());
        store.insert_resume(&new_resume("b1", "a.pdf", Some("x@example.com"), "")).await.unwrap();

        let found = CandidateMatcher::new(store).find("b2", "b.pdf", None, Some("  ")).await.unwrap();

        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_submission_key_wins() {
        let store = Arc::new(MemoryStore::new());
        let original = store.insert_resume(&new_resume("b1", "a.pdf", None, "")).await.unwrap();

        let (found, kind) = CandidateMatcher::new(store)
            .find("b1", "a.pdf", Some("someone@else.com"), None)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.id, original.id);
        assert_eq!(kind, MatchKind::Submission);
    }

    #[tokio::test]
    async fn test_email_matches_sender_case_insensitively() {
        let store = Arc::new(MemoryStore::new());
        let mut first = new_resume("b1", "a.pdf", None, "");
        first.sender = Some("Jane@Example.com".to_string());
        let first = store.insert_resume(&first).await.unwrap();

        let (found, kind) = CandidateMatcher::new(store)
            .find("b2", "b.pdf", Some("jane@example.com"), None)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.id, first.id);
        assert_eq!(kind, MatchKind::Contact);
    }

    #[tokio::test]
    async fn test_most_recent_contact_match_wins() {
        let store = Arc::new(MemoryStore::new());
        let mut older = new_resume("b1", "a.pdf", None, "+1 415 555 0134");
        older.received_at = Utc::now() - Duration::days(3);
        store.insert_resume(&older).await.unwrap();
        let newer = store
            .insert_resume(&new_resume("b2", "b.pdf", None, "+1 415 555 0134"))
            .await
            .unwrap();

        let (found, _) = CandidateMatcher::new(store)
            .find("b3", "c.pdf", None, Some("+1 415 555 0134"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.id, newer.id);
    }
}
