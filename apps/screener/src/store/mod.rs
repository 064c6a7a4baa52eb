//! Repository interface over the relational store.
//!
//! The pipeline only talks to `ScreeningStore`; `PgStore` is the production
//! implementation. Every method maps to a single statement (or one read plus
//! one grouped read) so a pooled connection is held only for that call.

pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::audit::{ActivityAction, NewErrorLog};
use crate::models::job::JobDescription;
use crate::models::resume::{NewResume, ProfileUpdate, Resubmission, Resume, ResumeStatus};
use crate::models::score::{CriterionResult, ResumeScore};

pub use postgres::PgStore;

#[async_trait]
pub trait ScreeningStore: Send + Sync {
    /// Active jobs with their criteria, ordered by name.
    async fn active_jobs(&self) -> Result<Vec<JobDescription>>;

    async fn get_job(&self, job_id: i64) -> Result<Option<JobDescription>>;

    async fn get_resume(&self, resume_id: Uuid) -> Result<Option<Resume>>;

    /// Exact submission-key lookup `(batch_id, attachment_name)`.
    async fn find_by_submission(
        &self,
        batch_id: &str,
        attachment_name: &str,
    ) -> Result<Option<Resume>>;

    /// Most recently received resume where `candidate_email` or `sender`
    /// equals `email` (case-insensitive), or `candidate_phone` equals `phone`.
    /// Returns `None` without querying when both are absent.
    async fn find_by_contact(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Option<Resume>>;

    async fn insert_resume(&self, resume: &NewResume) -> Result<Resume>;

    /// Overwrites content fields, resets status to `PENDING` and clears the
    /// human override.
    async fn resubmit_resume(&self, resume_id: Uuid, update: &Resubmission) -> Result<Resume>;

    /// Writes only the fields set in `update`.
    async fn apply_profile(&self, resume_id: Uuid, update: &ProfileUpdate) -> Result<()>;

    async fn set_text_content(&self, resume_id: Uuid, text: &str) -> Result<()>;

    async fn resumes_with_text(&self) -> Result<Vec<Resume>>;

    async fn resumes_missing_text(&self, limit: Option<i64>) -> Result<Vec<Resume>>;

    /// Insert-or-overwrite keyed on `(resume_id, job_id)`.
    async fn upsert_score(
        &self,
        resume_id: Uuid,
        job_id: i64,
        total_score: f64,
        detail: &[CriterionResult],
    ) -> Result<ResumeScore>;

    async fn get_score(&self, score_id: Uuid) -> Result<Option<ResumeScore>>;

    /// All scores, optionally for one job, highest first.
    async fn list_scores(&self, job_id: Option<i64>) -> Result<Vec<ResumeScore>>;

    /// Scores for `job_id` whose resume currently carries one of `batch_ids`.
    async fn scores_for_batches(&self, batch_ids: &[String], job_id: i64)
        -> Result<Vec<ResumeScore>>;

    /// Compare-and-set status change. Returns `false` when the stored status
    /// was no longer `from`.
    async fn transition_status(
        &self,
        resume_id: Uuid,
        from: ResumeStatus,
        to: ResumeStatus,
    ) -> Result<bool>;

    async fn log_activity(
        &self,
        resume_id: Uuid,
        action: ActivityAction,
        details: &str,
    ) -> Result<()>;

    async fn record_error(&self, entry: &NewErrorLog) -> Result<()>;
}

/// Row-level timestamp helper shared by implementations.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now()
}
