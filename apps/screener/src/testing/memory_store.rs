//! `ScreeningStore` over plain vectors, mirroring the Postgres constraints the
//! pipeline relies on: unique submission key and unique `(resume, job)` score.

use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::models::audit::{ActivityAction, NewErrorLog};
use crate::models::job::JobDescription;
use crate::models::resume::{NewResume, ProfileUpdate, Resubmission, Resume, ResumeStatus};
use crate::models::score::{CriterionResult, ResumeScore};
use crate::store::{now, ScreeningStore};

#[derive(Default)]
struct Tables {
    jobs: Vec<JobDescription>,
    resumes: Vec<Resume>,
    scores: Vec<ResumeScore>,
    activities: Vec<(Uuid, ActivityAction, String)>,
    errors: Vec<NewErrorLog>,
    fail_error_log: bool,
    fail_resubmit: bool,
    failing_score_jobs: Vec<i64>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().expect("memory store poisoned")
    }

    pub fn add_job(&self, job: JobDescription) {
        self.tables().jobs.push(job);
    }

    pub fn all_resumes(&self) -> Vec<Resume> {
        self.tables().resumes.clone()
    }

    pub fn errors(&self) -> Vec<NewErrorLog> {
        self.tables().errors.clone()
    }

    /// Activity details logged for `resume_id` under `action`, oldest first.
    pub fn activities_of(&self, resume_id: Uuid, action: ActivityAction) -> Vec<String> {
        self.tables()
            .activities
            .iter()
            .filter(|(id, a, _)| *id == resume_id && *a == action)
            .map(|(_, _, details)| details.clone())
            .collect()
    }

    pub fn fail_error_log(&self, fail: bool) {
        self.tables().fail_error_log = fail;
    }

    pub fn fail_resubmit(&self, fail: bool) {
        self.tables().fail_resubmit = fail;
    }

    /// Makes `upsert_score` fail for `job_id` only.
    pub fn fail_scores_for_job(&self, job_id: i64) {
        self.tables().failing_score_jobs.push(job_id);
    }

    /// Stands in for a reviewer's manual override.
    pub fn set_human_score(&self, resume_id: Uuid, score: f64, breakdown: Value) {
        if let Some(row) = self.tables().resumes.iter_mut().find(|r| r.id == resume_id) {
            row.human_score = Some(score);
            row.human_score_breakdown = breakdown;
        }
    }
}

fn same_email(stored: Option<&str>, email: &str) -> bool {
    stored.is_some_and(|s| s.eq_ignore_ascii_case(email))
}

#[async_trait]
impl ScreeningStore for MemoryStore {
    async fn active_jobs(&self) -> Result<Vec<JobDescription>> {
        let mut jobs: Vec<JobDescription> =
            self.tables().jobs.iter().filter(|j| j.active).cloned().collect();
        jobs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(jobs)
    }

    async fn get_job(&self, job_id: i64) -> Result<Option<JobDescription>> {
        Ok(self.tables().jobs.iter().find(|j| j.id == job_id).cloned())
    }

    async fn get_resume(&self, resume_id: Uuid) -> Result<Option<Resume>> {
        Ok(self.tables().resumes.iter().find(|r| r.id == resume_id).cloned())
    }

    async fn find_by_submission(
        &self,
        batch_id: &str,
        attachment_name: &str,
    ) -> Result<Option<Resume>> {
        Ok(self
            .tables()
            .resumes
            .iter()
            .find(|r| r.batch_id == batch_id && r.attachment_name == attachment_name)
            .cloned())
    }

    async fn find_by_contact(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Option<Resume>> {
        if email.is_none() && phone.is_none() {
            return Ok(None);
        }
        Ok(self
            .tables()
            .resumes
            .iter()
            .filter(|r| {
                let by_email = email.is_some_and(|e| {
                    same_email(r.candidate_email.as_deref(), e) || same_email(r.sender.as_deref(), e)
                });
                let by_phone = phone.is_some_and(|p| r.candidate_phone == p);
                by_email || by_phone
            })
            .max_by_key(|r| r.received_at)
            .cloned())
    }

    async fn insert_resume(&self, resume: &NewResume) -> Result<Resume> {
        let mut tables = self.tables();
        if tables
            .resumes
            .iter()
            .any(|r| r.batch_id == resume.batch_id && r.attachment_name == resume.attachment_name)
        {
            bail!(
                "duplicate submission key ({}, {})",
                resume.batch_id,
                resume.attachment_name
            );
        }
        let row = Resume {
            id: Uuid::new_v4(),
            batch_id: resume.batch_id.clone(),
            attachment_name: resume.attachment_name.clone(),
            sender: resume.sender.clone(),
            candidate_name: resume.candidate_name.clone(),
            candidate_email: resume.candidate_email.clone(),
            candidate_phone: resume.candidate_phone.clone(),
            linkedin_url: String::new(),
            candidate_role: String::new(),
            candidate_company: String::new(),
            candidate_location: String::new(),
            source: resume.source,
            is_active_seeker: resume.is_active_seeker,
            is_favorite: false,
            text_content: resume.text_content.clone(),
            file_url: resume.file_url.clone(),
            received_at: resume.received_at,
            created_at: now(),
            status: resume.status,
            rejection_email_sent: false,
            interview_email_sent: false,
            human_score: None,
            human_score_breakdown: json!({}),
        };
        tables.resumes.push(row.clone());
        Ok(row)
    }

    async fn resubmit_resume(&self, resume_id: Uuid, update: &Resubmission) -> Result<Resume> {
        let mut tables = self.tables();
        if tables.fail_resubmit {
            bail!("connection reset while updating resume {resume_id}");
        }
        let row = tables
            .resumes
            .iter_mut()
            .find(|r| r.id == resume_id)
            .ok_or_else(|| anyhow!("resume {resume_id} not found"))?;
        row.batch_id = update.batch_id.clone();
        row.attachment_name = update.attachment_name.clone();
        row.sender = update.sender.clone();
        row.candidate_name = update.candidate_name.clone();
        row.candidate_email = update.candidate_email.clone();
        row.candidate_phone = update.candidate_phone.clone();
        row.is_active_seeker = update.is_active_seeker;
        row.text_content = update.text_content.clone();
        row.file_url = update.file_url.clone();
        row.received_at = update.received_at;
        row.status = ResumeStatus::Pending;
        row.human_score = None;
        row.human_score_breakdown = json!({});
        Ok(row.clone())
    }

    async fn apply_profile(&self, resume_id: Uuid, update: &ProfileUpdate) -> Result<()> {
        let mut tables = self.tables();
        let row = tables
            .resumes
            .iter_mut()
            .find(|r| r.id == resume_id)
            .ok_or_else(|| anyhow!("resume {resume_id} not found"))?;
        update.apply_to(row);
        Ok(())
    }

    async fn set_text_content(&self, resume_id: Uuid, text: &str) -> Result<()> {
        if let Some(row) = self.tables().resumes.iter_mut().find(|r| r.id == resume_id) {
            row.text_content = text.to_string();
        }
        Ok(())
    }

    async fn resumes_with_text(&self) -> Result<Vec<Resume>> {
        let mut rows: Vec<Resume> = self
            .tables()
            .resumes
            .iter()
            .filter(|r| !r.text_content.is_empty())
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        Ok(rows)
    }

    async fn resumes_missing_text(&self, limit: Option<i64>) -> Result<Vec<Resume>> {
        let mut rows: Vec<Resume> = self
            .tables()
            .resumes
            .iter()
            .filter(|r| r.text_content.is_empty() && !r.file_url.is_empty())
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        if let Some(limit) = limit {
            rows.truncate(limit.max(0) as usize);
        }
        Ok(rows)
    }

    async fn upsert_score(
        &self,
        resume_id: Uuid,
        job_id: i64,
        total_score: f64,
        detail: &[CriterionResult],
    ) -> Result<ResumeScore> {
        let mut tables = self.tables();
        if tables.failing_score_jobs.contains(&job_id) {
            bail!("deadlock detected while saving score for job {job_id}");
        }
        if let Some(existing) = tables
            .scores
            .iter_mut()
            .find(|s| s.resume_id == resume_id && s.job_id == job_id)
        {
            existing.total_score = total_score;
            existing.detail = detail.to_vec();
            existing.created_at = now();
            return Ok(existing.clone());
        }
        let score = ResumeScore {
            id: Uuid::new_v4(),
            resume_id,
            job_id,
            total_score,
            detail: detail.to_vec(),
            created_at: now(),
        };
        tables.scores.push(score.clone());
        Ok(score)
    }

    async fn get_score(&self, score_id: Uuid) -> Result<Option<ResumeScore>> {
        Ok(self.tables().scores.iter().find(|s| s.id == score_id).cloned())
    }

    async fn list_scores(&self, job_id: Option<i64>) -> Result<Vec<ResumeScore>> {
        let mut scores: Vec<ResumeScore> = self
            .tables()
            .scores
            .iter()
            .filter(|s| job_id.map_or(true, |id| s.job_id == id))
            .cloned()
            .collect();
        scores.sort_by(|a, b| b.total_score.total_cmp(&a.total_score));
        Ok(scores)
    }

    async fn scores_for_batches(
        &self,
        batch_ids: &[String],
        job_id: i64,
    ) -> Result<Vec<ResumeScore>> {
        let tables = self.tables();
        let mut scores: Vec<ResumeScore> = tables
            .scores
            .iter()
            .filter(|s| s.job_id == job_id)
            .filter(|s| {
                tables
                    .resumes
                    .iter()
                    .any(|r| r.id == s.resume_id && batch_ids.contains(&r.batch_id))
            })
            .cloned()
            .collect();
        scores.sort_by(|a, b| b.total_score.total_cmp(&a.total_score));
        Ok(scores)
    }

    async fn transition_status(
        &self,
        resume_id: Uuid,
        from: ResumeStatus,
        to: ResumeStatus,
    ) -> Result<bool> {
        let mut tables = self.tables();
        match tables
            .resumes
            .iter_mut()
            .find(|r| r.id == resume_id && r.status == from)
        {
            Some(row) => {
                row.status = to;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn log_activity(
        &self,
        resume_id: Uuid,
        action: ActivityAction,
        details: &str,
    ) -> Result<()> {
        self.tables()
            .activities
            .push((resume_id, action, details.to_string()));
        Ok(())
    }

    async fn record_error(&self, entry: &NewErrorLog) -> Result<()> {
        let mut tables = self.tables();
        if tables.fail_error_log {
            bail!("error_logs table unavailable");
        }
        tables.errors.push(entry.clone());
        Ok(())
    }
}
