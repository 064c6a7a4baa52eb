use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::audit::ErrorRecorder;
use crate::models::audit::ActivityAction;
use crate::models::resume::ResumeStatus;
use crate::models::score::ResumeScore;
use crate::store::ScreeningStore;

/// Statuses a low score never overrides.
const PROTECTED_FROM_REJECTION: &[ResumeStatus] = &[
    ResumeStatus::AutoRejected,
    ResumeStatus::Rejected,
    ResumeStatus::Hired,
    ResumeStatus::InterviewScheduled,
    ResumeStatus::InterviewPassed,
    ResumeStatus::InterviewRejected,
];

/// Statuses a passing score promotes to `NEW`.
const PROMOTABLE: &[ResumeStatus] = &[ResumeStatus::Pending, ResumeStatus::AutoRejected];

/// The transition a score triggers from `current`, if any.
pub fn decide(current: ResumeStatus, total_score: f64, threshold: f64) -> Option<ResumeStatus> {
    if total_score < threshold {
        (!PROTECTED_FROM_REJECTION.contains(&current)).then_some(ResumeStatus::AutoRejected)
    } else {
        PROMOTABLE.contains(&current).then_some(ResumeStatus::New)
    }
}

/// Moves a resume between `PENDING`, `NEW` and `AUTO_REJECTED` after each
/// score write. Runs once per `(resume, job)` score, so with several jobs the
/// last completed score decides.
#[derive(Clone)]
pub struct AutomationPolicy {
    store: Arc<dyn ScreeningStore>,
    recorder: ErrorRecorder,
    threshold: f64,
}

impl AutomationPolicy {
    pub fn new(store: Arc<dyn ScreeningStore>, threshold: f64) -> Self {
        Self {
            recorder: ErrorRecorder::new(store.clone()),
            store,
            threshold,
        }
    }

    /// Applies the transition for `score`, if any. Returns the new status
    /// when one was written. A lost compare-and-set race is a no-op.
    pub async fn apply(&self, score: &ResumeScore) -> Result<Option<ResumeStatus>> {
        let Some(resume) = self.store.get_resume(score.resume_id).await? else {
            return Ok(None);
        };
        let Some(next) = decide(resume.status, score.total_score, self.threshold) else {
            return Ok(None);
        };

        if !self
            .store
            .transition_status(resume.id, resume.status, next)
            .await?
        {
            return Ok(None);
        }

        let details = match next {
            ResumeStatus::AutoRejected => format!(
                "Auto-rejected: score {:.1} below threshold {:.1} (job {})",
                score.total_score, self.threshold, score.job_id
            ),
            _ => format!(
                "Moved to {next}: score {:.1} meets threshold {:.1} (job {})",
                score.total_score, self.threshold, score.job_id
            ),
        };
        info!("Resume {}: {} -> {next} ({details})", resume.id, resume.status);
        self.recorder
            .activity(resume.id, ActivityAction::StatusChange, &details)
            .await;

        Ok(Some(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::new_resume;
    use crate::testing::MemoryStore;
    use ResumeStatus::*;

    #[test]
    fn test_low_score_rejects_unless_protected() {
        assert_eq!(decide(Pending, 59.9, 60.0), Some(AutoRejected));
        assert_eq!(decide(New, 10.0, 60.0), Some(AutoRejected));
        assert_eq!(decide(Shortlisted, 10.0, 60.0), Some(AutoRejected));
        for protected in [AutoRejected, Rejected, Hired, InterviewScheduled, InterviewPassed, InterviewRejected] {
            assert_eq!(decide(protected, 0.0, 60.0), None, "{protected}");
        }
    }

    #[test]
    fn test_passing_score_promotes_only_pending_or_auto_rejected() {
        assert_eq!(decide(Pending, 60.0, 60.0), Some(New));
        assert_eq!(decide(AutoRejected, 90.0, 60.0), Some(New));
        for untouched in [New, Shortlisted, Rejected, Hired, InterviewScheduled] {
            assert_eq!(decide(untouched, 90.0, 60.0), None, "{untouched}");
        }
    }

    async fn scored(store: &Arc<MemoryStore>, total: f64) -> ResumeScore {
        let resume = store.insert_resume(&new_resume("b1", "cv.pdf", None, "")).await.unwrap();
        store.upsert_score(resume.id, 1, total, &[]).await.unwrap()
    }

    #[tokio::test]
    async fn test_apply_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let policy = AutomationPolicy::new(store.clone(), 60.0);
        let score = scored(&store, 30.0).await;

        assert_eq!(policy.apply(&score).await.unwrap(), Some(AutoRejected));
        assert_eq!(policy.apply(&score).await.unwrap(), None);

        assert_eq!(store.activities_of(score.resume_id, ActivityAction::StatusChange).len(), 1);
        assert_eq!(store.get_resume(score.resume_id).await.unwrap().unwrap().status, AutoRejected);
    }

    #[tokio::test]
    async fn test_multi_job_oscillation_follows_last_score() {
        let store = Arc::new(MemoryStore::new());
        let policy = AutomationPolicy::new(store.clone(), 60.0);
        let low = scored(&store, 40.0).await;
        let high = store.upsert_score(low.resume_id, 2, 80.0, &[]).await.unwrap();

        assert_eq!(policy.apply(&low).await.unwrap(), Some(AutoRejected));
        assert_eq!(policy.apply(&high).await.unwrap(), Some(New));
        assert_eq!(policy.apply(&low).await.unwrap(), Some(AutoRejected));

        let changes = store.activities_of(low.resume_id, ActivityAction::StatusChange);
        assert_eq!(changes.len(), 3);
        assert!(changes[0].contains("40.0"));
        assert!(changes[0].contains("60.0"));
    }

    #[tokio::test]
    async fn test_recruiter_decision_is_respected() {
        let store = Arc::new(MemoryStore::new());
        let policy = AutomationPolicy::new(store.clone(), 60.0);
        let score = scored(&store, 10.0).await;
        store.transition_status(score.resume_id, Pending, Hired).await.unwrap();

        assert_eq!(policy.apply(&score).await.unwrap(), None);
        assert!(store.activities_of(score.resume_id, ActivityAction::StatusChange).is_empty());
    }
}
