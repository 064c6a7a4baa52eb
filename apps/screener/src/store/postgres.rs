use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

use crate::models::audit::{ActivityAction, NewErrorLog};
use crate::models::job::{Criterion, JobDescription};
use crate::models::resume::{NewResume, ProfileUpdate, Resubmission, Resume, ResumeStatus};
use crate::models::score::{CriterionResult, ResumeScore};
use crate::store::{now, ScreeningStore};

const RESUME_COLUMNS: &str = "id, batch_id, attachment_name, sender, candidate_name, \
    candidate_email, candidate_phone, linkedin_url, candidate_role, candidate_company, \
    candidate_location, source, is_active_seeker, is_favorite, text_content, file_url, \
    received_at, created_at, status, rejection_email_sent, interview_email_sent, \
    human_score, human_score_breakdown";

const SCORE_COLUMNS: &str = "id, resume_id, job_id, total_score, detail, created_at";

#[derive(Debug, FromRow)]
struct ResumeRow {
    id: Uuid,
    batch_id: String,
    attachment_name: String,
    sender: Option<String>,
    candidate_name: String,
    candidate_email: Option<String>,
    candidate_phone: String,
    linkedin_url: String,
    candidate_role: String,
    candidate_company: String,
    candidate_location: String,
    source: String,
    is_active_seeker: bool,
    is_favorite: bool,
    text_content: String,
    file_url: String,
    received_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    status: String,
    rejection_email_sent: bool,
    interview_email_sent: bool,
    human_score: Option<f64>,
    human_score_breakdown: Value,
}

impl TryFrom<ResumeRow> for Resume {
    type Error = anyhow::Error;

    fn try_from(row: ResumeRow) -> Result<Self> {
        Ok(Resume {
            id: row.id,
            batch_id: row.batch_id,
            attachment_name: row.attachment_name,
            sender: row.sender,
            candidate_name: row.candidate_name,
            candidate_email: row.candidate_email,
            candidate_phone: row.candidate_phone,
            linkedin_url: row.linkedin_url,
            candidate_role: row.candidate_role,
            candidate_company: row.candidate_company,
            candidate_location: row.candidate_location,
            source: row.source.parse()?,
            is_active_seeker: row.is_active_seeker,
            is_favorite: row.is_favorite,
            text_content: row.text_content,
            file_url: row.file_url,
            received_at: row.received_at,
            created_at: row.created_at,
            status: row.status.parse()?,
            rejection_email_sent: row.rejection_email_sent,
            interview_email_sent: row.interview_email_sent,
            human_score: row.human_score,
            human_score_breakdown: row.human_score_breakdown,
        })
    }
}

#[derive(Debug, FromRow)]
struct ScoreRow {
    id: Uuid,
    resume_id: Uuid,
    job_id: i64,
    total_score: f64,
    detail: Value,
    created_at: DateTime<Utc>,
}

impl From<ScoreRow> for ResumeScore {
    fn from(row: ScoreRow) -> Self {
        // Older rows may carry partial entries; unreadable detail reads as empty.
        let detail = serde_json::from_value::<Vec<CriterionResult>>(row.detail).unwrap_or_default();
        ResumeScore {
            id: row.id,
            resume_id: row.resume_id,
            job_id: row.job_id,
            total_score: row.total_score,
            detail,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct JobRow {
    id: i64,
    name: String,
    summary: String,
    active: bool,
}

/// `ScreeningStore` over a Postgres pool. Each call checks a connection out
/// of the pool for one query and returns it when the future completes.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn attach_criteria(&self, jobs: Vec<JobRow>) -> Result<Vec<JobDescription>> {
        let ids: Vec<i64> = jobs.iter().map(|j| j.id).collect();
        let criteria: Vec<Criterion> = sqlx::query_as(
            "SELECT id, job_id, detail FROM qualification_criteria WHERE job_id = ANY($1) ORDER BY id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_job: HashMap<i64, Vec<Criterion>> = HashMap::new();
        for criterion in criteria {
            by_job.entry(criterion.job_id).or_default().push(criterion);
        }

        Ok(jobs
            .into_iter()
            .map(|job| JobDescription {
                criteria: by_job.remove(&job.id).unwrap_or_default(),
                id: job.id,
                name: job.name,
                summary: job.summary,
                active: job.active,
            })
            .collect())
    }
}

fn into_resumes(rows: Vec<ResumeRow>) -> Result<Vec<Resume>> {
    rows.into_iter().map(Resume::try_from).collect()
}

#[async_trait]
impl ScreeningStore for PgStore {
    async fn active_jobs(&self) -> Result<Vec<JobDescription>> {
        let jobs: Vec<JobRow> = sqlx::query_as(
            "SELECT id, name, summary, active FROM job_descriptions WHERE active ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        self.attach_criteria(jobs).await
    }

    async fn get_job(&self, job_id: i64) -> Result<Option<JobDescription>> {
        let job: Option<JobRow> =
            sqlx::query_as("SELECT id, name, summary, active FROM job_descriptions WHERE id = $1")
                .bind(job_id)
                .fetch_optional(&self.pool)
                .await?;
        match job {
            Some(job) => Ok(self.attach_criteria(vec![job]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn get_resume(&self, resume_id: Uuid) -> Result<Option<Resume>> {
        let row: Option<ResumeRow> =
            sqlx::query_as(&format!("SELECT {RESUME_COLUMNS} FROM resumes WHERE id = $1"))
                .bind(resume_id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Resume::try_from).transpose()
    }

    async fn find_by_submission(
        &self,
        batch_id: &str,
        attachment_name: &str,
    ) -> Result<Option<Resume>> {
        let row: Option<ResumeRow> = sqlx::query_as(&format!(
            "SELECT {RESUME_COLUMNS} FROM resumes WHERE batch_id = $1 AND attachment_name = $2"
        ))
        .bind(batch_id)
        .bind(attachment_name)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Resume::try_from).transpose()
    }

    async fn find_by_contact(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Option<Resume>> {
        if email.is_none() && phone.is_none() {
            return Ok(None);
        }
        let row: Option<ResumeRow> = sqlx::query_as(&format!(
            r#"
            SELECT {RESUME_COLUMNS} FROM resumes
            WHERE ($1::text IS NOT NULL AND (LOWER(candidate_email) = LOWER($1) OR LOWER(sender) = LOWER($1)))
               OR ($2::text IS NOT NULL AND candidate_phone = $2)
            ORDER BY received_at DESC
            LIMIT 1
            "#
        ))
        .bind(email)
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Resume::try_from).transpose()
    }

    async fn insert_resume(&self, resume: &NewResume) -> Result<Resume> {
        let id = Uuid::new_v4();
        let row: ResumeRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO resumes
                (id, batch_id, attachment_name, sender, candidate_name, candidate_email,
                 candidate_phone, source, is_active_seeker, text_content, file_url,
                 received_at, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {RESUME_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&resume.batch_id)
        .bind(&resume.attachment_name)
        .bind(&resume.sender)
        .bind(&resume.candidate_name)
        .bind(&resume.candidate_email)
        .bind(&resume.candidate_phone)
        .bind(resume.source.as_str())
        .bind(resume.is_active_seeker)
        .bind(&resume.text_content)
        .bind(&resume.file_url)
        .bind(resume.received_at)
        .bind(resume.status.as_str())
        .fetch_one(&self.pool)
        .await
        .with_context(|| {
            format!(
                "Failed to insert resume {}/{}",
                resume.batch_id, resume.attachment_name
            )
        })?;
        debug!("Inserted resume {id}");
        row.try_into()
    }

    async fn resubmit_resume(&self, resume_id: Uuid, update: &Resubmission) -> Result<Resume> {
        let row: ResumeRow = sqlx::query_as(&format!(
            r#"
            UPDATE resumes SET
                batch_id = $2, attachment_name = $3, sender = $4, candidate_name = $5,
                candidate_email = $6, candidate_phone = $7, is_active_seeker = $8,
                text_content = $9, file_url = $10, received_at = $11,
                status = $12, human_score = NULL, human_score_breakdown = '{{}}'::jsonb
            WHERE id = $1
            RETURNING {RESUME_COLUMNS}
            "#
        ))
        .bind(resume_id)
        .bind(&update.batch_id)
        .bind(&update.attachment_name)
        .bind(&update.sender)
        .bind(&update.candidate_name)
        .bind(&update.candidate_email)
        .bind(&update.candidate_phone)
        .bind(update.is_active_seeker)
        .bind(&update.text_content)
        .bind(&update.file_url)
        .bind(update.received_at)
        .bind(ResumeStatus::Pending.as_str())
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("Failed to update resume {resume_id}"))?;
        row.try_into()
    }

    async fn apply_profile(&self, resume_id: Uuid, update: &ProfileUpdate) -> Result<()> {
        if update.is_empty() {
            return Ok(());
        }
        // COALESCE keeps columns whose bind is NULL, so only set fields change.
        sqlx::query(
            r#"
            UPDATE resumes SET
                candidate_name = COALESCE($2, candidate_name),
                candidate_email = COALESCE($3, candidate_email),
                candidate_phone = COALESCE($4, candidate_phone),
                linkedin_url = COALESCE($5, linkedin_url),
                candidate_role = COALESCE($6, candidate_role),
                candidate_company = COALESCE($7, candidate_company),
                candidate_location = COALESCE($8, candidate_location)
            WHERE id = $1
            "#,
        )
        .bind(resume_id)
        .bind(&update.candidate_name)
        .bind(&update.candidate_email)
        .bind(&update.candidate_phone)
        .bind(&update.linkedin_url)
        .bind(&update.candidate_role)
        .bind(&update.candidate_company)
        .bind(&update.candidate_location)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_text_content(&self, resume_id: Uuid, text: &str) -> Result<()> {
        sqlx::query("UPDATE resumes SET text_content = $2 WHERE id = $1")
            .bind(resume_id)
            .bind(text)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn resumes_with_text(&self) -> Result<Vec<Resume>> {
        let rows: Vec<ResumeRow> = sqlx::query_as(&format!(
            "SELECT {RESUME_COLUMNS} FROM resumes WHERE text_content <> '' ORDER BY received_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        into_resumes(rows)
    }

    async fn resumes_missing_text(&self, limit: Option<i64>) -> Result<Vec<Resume>> {
        let rows: Vec<ResumeRow> = sqlx::query_as(&format!(
            r#"
            SELECT {RESUME_COLUMNS} FROM resumes
            WHERE text_content = '' AND file_url <> ''
            ORDER BY received_at DESC
            LIMIT $1
            "#
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        into_resumes(rows)
    }

    async fn upsert_score(
        &self,
        resume_id: Uuid,
        job_id: i64,
        total_score: f64,
        detail: &[CriterionResult],
    ) -> Result<ResumeScore> {
        let row: ScoreRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO resume_scores (id, resume_id, job_id, total_score, detail, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (resume_id, job_id) DO UPDATE SET
                total_score = EXCLUDED.total_score,
                detail = EXCLUDED.detail,
                created_at = EXCLUDED.created_at
            RETURNING {SCORE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(resume_id)
        .bind(job_id)
        .bind(total_score)
        .bind(Json(detail))
        .bind(now())
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("Failed to upsert score for resume {resume_id} job {job_id}"))?;
        Ok(row.into())
    }

    async fn get_score(&self, score_id: Uuid) -> Result<Option<ResumeScore>> {
        let row: Option<ScoreRow> =
            sqlx::query_as(&format!("SELECT {SCORE_COLUMNS} FROM resume_scores WHERE id = $1"))
                .bind(score_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(ResumeScore::from))
    }

    async fn list_scores(&self, job_id: Option<i64>) -> Result<Vec<ResumeScore>> {
        let rows: Vec<ScoreRow> = sqlx::query_as(&format!(
            r#"
            SELECT {SCORE_COLUMNS} FROM resume_scores
            WHERE ($1::bigint IS NULL OR job_id = $1)
            ORDER BY total_score DESC
            "#
        ))
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ResumeScore::from).collect())
    }

    async fn scores_for_batches(
        &self,
        batch_ids: &[String],
        job_id: i64,
    ) -> Result<Vec<ResumeScore>> {
        let rows: Vec<ScoreRow> = sqlx::query_as(
            r#"
            SELECT s.id, s.resume_id, s.job_id, s.total_score, s.detail, s.created_at
            FROM resume_scores s
            JOIN resumes r ON r.id = s.resume_id
            WHERE s.job_id = $1 AND r.batch_id = ANY($2)
            ORDER BY s.total_score DESC
            "#,
        )
        .bind(job_id)
        .bind(batch_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ResumeScore::from).collect())
    }

    async fn transition_status(
        &self,
        resume_id: Uuid,
        from: ResumeStatus,
        to: ResumeStatus,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE resumes SET status = $3 WHERE id = $1 AND status = $2")
            .bind(resume_id)
            .bind(from.as_str())
            .bind(to.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn log_activity(
        &self,
        resume_id: Uuid,
        action: ActivityAction,
        details: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO resume_activity_logs (resume_id, action_type, details) VALUES ($1, $2, $3)",
        )
        .bind(resume_id)
        .bind(action.as_str())
        .bind(details)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_error(&self, entry: &NewErrorLog) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO error_logs (location, message, details, context, resume_id, resolved)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&entry.location)
        .bind(&entry.message)
        .bind(&entry.details)
        .bind(&entry.context)
        .bind(entry.resume_id)
        .bind(entry.resolved)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
