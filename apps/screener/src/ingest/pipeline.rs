use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use serde_json::json;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::automation::AutomationPolicy;
use super::matcher::{CandidateMatcher, MatchKind};
use crate::audit::ErrorRecorder;
use crate::blob_store::BlobStore;
use crate::config::IngestConfig;
use crate::evaluator::{CandidateProfile, Evaluation, Evaluator};
use crate::extraction::{contact, TextExtractor};
use crate::models::audit::ActivityAction;
use crate::models::job::JobDescription;
use crate::models::resume::{
    clean_string, filename_stem, infer_active_seeker, truncate_chars, AttachmentPayload,
    NewResume, ProfileUpdate, Resubmission, Resume, ResumeStatus, MAX_FILE_URL_LEN, MAX_NAME_LEN,
};
use crate::models::score::{CriterionResult, ResumeScore};
use crate::store::ScreeningStore;

const PROCESSING_FAILED_NOTE: &str = "Processing failed";
const MAX_FAILURE_NOTE_LEN: usize = 200;
const FILE_FETCH_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Error)]
pub enum RescoreError {
    #[error("score {0} not found")]
    NotFound(Uuid),

    #[error("resume {0} has no extracted text")]
    NoText(Uuid),

    #[error("scoring resume {resume_id} against job {job_id} did not produce a score")]
    Failed { resume_id: Uuid, job_id: i64 },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Drives attachments through extract → store → match → persist → score →
/// automate. Cheap to clone; every clone shares the same store, blob store
/// and LLM connection pool.
#[derive(Clone)]
pub struct Ingestor {
    store: Arc<dyn ScreeningStore>,
    blobs: Arc<dyn BlobStore>,
    evaluator: Evaluator,
    extractor: TextExtractor,
    matcher: CandidateMatcher,
    automation: AutomationPolicy,
    recorder: ErrorRecorder,
    config: IngestConfig,
    http: reqwest::Client,
}

impl Ingestor {
    pub fn new(
        store: Arc<dyn ScreeningStore>,
        blobs: Arc<dyn BlobStore>,
        evaluator: Evaluator,
        extractor: TextExtractor,
        config: IngestConfig,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(FILE_FETCH_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            matcher: CandidateMatcher::new(store.clone()),
            automation: AutomationPolicy::new(store.clone(), config.auto_rejection_threshold),
            recorder: ErrorRecorder::new(store.clone()),
            store,
            blobs,
            evaluator,
            extractor,
            config,
            http,
        }
    }

    // ────────────────────────────────────────────────────────────────────────
    // Ingestion
    // ────────────────────────────────────────────────────────────────────────

    /// Ingests a batch with at most `max_workers` attachments in flight.
    /// Scores against `jobs`, or every active job when `None`. Returns the
    /// number of attachments that produced a saved resume; individual
    /// failures are recorded, never propagated.
    pub async fn ingest(
        &self,
        attachments: Vec<AttachmentPayload>,
        jobs: Option<Vec<JobDescription>>,
    ) -> Result<usize> {
        if attachments.is_empty() {
            return Ok(0);
        }
        let jobs: Arc<[JobDescription]> = match jobs {
            Some(jobs) => jobs.into(),
            None => self
                .store
                .active_jobs()
                .await
                .context("Failed to load active jobs")?
                .into(),
        };

        let total = attachments.len();
        let permits = Arc::new(Semaphore::new(self.config.max_workers.clamp(1, total)));
        let mut tasks = JoinSet::new();

        for attachment in attachments {
            let ingestor = self.clone();
            let jobs = jobs.clone();
            let permits = permits.clone();
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                ingestor.ingest_one(attachment, &jobs).await
            });
        }

        let mut saved = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(true) => saved += 1,
                Ok(false) => {}
                Err(e) => error!("Ingest worker aborted: {e}"),
            }
        }

        info!("Ingested {saved}/{total} attachment(s) against {} job(s)", jobs.len());
        Ok(saved)
    }

    /// Processes one attachment end to end. On failure an error row is
    /// written and the submission gets zero scores so it stays visible.
    pub async fn ingest_one(&self, attachment: AttachmentPayload, jobs: &[JobDescription]) -> bool {
        let text = self
            .extractor
            .extract(&attachment.attachment_name, attachment.content.clone(), &self.recorder)
            .await;

        match self.save_submission(&attachment, &text).await {
            Ok(resume) => {
                self.score_for_jobs(resume, &text, jobs, ActivityAction::Scored)
                    .await;
                true
            }
            Err(e) => {
                error!(
                    "Ingest failed for {} (batch {}): {e:#}",
                    attachment.attachment_name, attachment.batch_id
                );
                self.recorder
                    .record(
                        "ingest",
                        &e.to_string(),
                        &format!("{e:?}"),
                        json!({
                            "batch_id": attachment.batch_id,
                            "attachment": attachment.attachment_name,
                        }),
                        None,
                    )
                    .await;
                self.record_failure(&attachment, jobs, &e).await;
                false
            }
        }
    }

    async fn save_submission(&self, attachment: &AttachmentPayload, text: &str) -> Result<Resume> {
        let phone = contact::extract_phone(text);
        let sender = attachment
            .sender
            .as_deref()
            .map(clean_string)
            .filter(|s| !s.is_empty());
        let email = contact::extract_email(text).or_else(|| sender.clone());
        let file_url = truncate_chars(&self.store_file(attachment).await, MAX_FILE_URL_LEN);
        let stem = attachment.name_stem();
        let is_active_seeker =
            infer_active_seeker(sender.as_deref(), email.as_deref(), attachment.source);

        let existing = self
            .matcher
            .find(
                &attachment.batch_id,
                &attachment.attachment_name,
                email.as_deref(),
                Some(phone.as_str()),
            )
            .await?;

        let Some((existing, kind)) = existing else {
            let resume = self
                .store
                .insert_resume(&NewResume {
                    batch_id: attachment.batch_id.clone(),
                    attachment_name: attachment.attachment_name.clone(),
                    sender,
                    candidate_name: stem,
                    candidate_email: email,
                    candidate_phone: phone,
                    source: attachment.source,
                    is_active_seeker,
                    text_content: text.to_string(),
                    file_url,
                    received_at: attachment.received_at,
                    status: ResumeStatus::Pending,
                })
                .await
                .context("Failed to insert resume")?;
            info!("Created resume {} from {}", resume.id, attachment.attachment_name);
            self.recorder
                .activity(
                    resume.id,
                    ActivityAction::Ingested,
                    &format!("New application via {}", attachment.source),
                )
                .await;
            return Ok(resume);
        };

        let provisional = filename_stem(&existing.attachment_name);
        let candidate_name =
            if existing.candidate_name.is_empty() || existing.candidate_name == provisional {
                stem
            } else {
                existing.candidate_name.clone()
            };
        let candidate_email = existing
            .candidate_email
            .clone()
            .filter(|e| !e.is_empty())
            .or(email);
        let candidate_phone = if existing.candidate_phone.is_empty() {
            phone
        } else {
            existing.candidate_phone.clone()
        };

        let resume = self
            .store
            .resubmit_resume(
                existing.id,
                &Resubmission {
                    batch_id: attachment.batch_id.clone(),
                    attachment_name: attachment.attachment_name.clone(),
                    sender: sender.or_else(|| existing.sender.clone()),
                    candidate_name,
                    candidate_email,
                    candidate_phone,
                    is_active_seeker,
                    text_content: text.to_string(),
                    file_url,
                    received_at: attachment.received_at,
                },
            )
            .await
            .context("Failed to update resubmitted resume")?;

        let how = match kind {
            MatchKind::Submission => "same attachment",
            MatchKind::Contact => "matched by contact",
        };
        info!("Updated resume {} from {} ({how})", resume.id, attachment.attachment_name);
        self.recorder
            .activity(
                resume.id,
                ActivityAction::Ingested,
                &format!("Updated via {} ({how})", attachment.source),
            )
            .await;
        Ok(resume)
    }

    /// Uploads the original bytes. Returns an empty reference when storage is
    /// unconfigured or the upload fails; the resume is saved either way.
    async fn store_file(&self, attachment: &AttachmentPayload) -> String {
        if !self.blobs.is_configured() {
            return String::new();
        }
        let key = attachment.storage_key();
        match self.blobs.upload(&key, attachment.content.clone(), None).await {
            Ok(blob_ref) => blob_ref,
            Err(e) => {
                warn!("Upload of {key} failed: {e}");
                self.recorder
                    .record("blob:upload", &e.to_string(), "", json!({ "blob": key }), None)
                    .await;
                String::new()
            }
        }
    }

    /// Zero scores carrying the failure reason, on a record found or created
    /// by submission key. Best effort.
    async fn record_failure(
        &self,
        attachment: &AttachmentPayload,
        jobs: &[JobDescription],
        cause: &anyhow::Error,
    ) {
        if let Err(e) = self.try_record_failure(attachment, jobs, cause).await {
            warn!(
                "Could not record failure for {} (batch {}): {e:#}",
                attachment.attachment_name, attachment.batch_id
            );
        }
    }

    async fn try_record_failure(
        &self,
        attachment: &AttachmentPayload,
        jobs: &[JobDescription],
        cause: &anyhow::Error,
    ) -> Result<()> {
        let resume = match self
            .store
            .find_by_submission(&attachment.batch_id, &attachment.attachment_name)
            .await?
        {
            Some(resume) => resume,
            None => {
                let sender = attachment
                    .sender
                    .as_deref()
                    .map(clean_string)
                    .filter(|s| !s.is_empty());
                self.store
                    .insert_resume(&NewResume {
                        batch_id: attachment.batch_id.clone(),
                        attachment_name: attachment.attachment_name.clone(),
                        sender: sender.clone(),
                        candidate_name: attachment.name_stem(),
                        is_active_seeker: infer_active_seeker(
                            sender.as_deref(),
                            sender.as_deref(),
                            attachment.source,
                        ),
                        candidate_email: sender,
                        candidate_phone: String::new(),
                        source: attachment.source,
                        text_content: String::new(),
                        file_url: String::new(),
                        received_at: attachment.received_at,
                        status: ResumeStatus::Pending,
                    })
                    .await?
            }
        };

        let note = truncate_chars(
            &format!("{PROCESSING_FAILED_NOTE}: {cause}"),
            MAX_FAILURE_NOTE_LEN,
        );
        for job in jobs {
            let detail: Vec<CriterionResult> = job
                .criteria
                .iter()
                .map(|criterion| CriterionResult {
                    criterion_id: criterion.id,
                    title: criterion.detail.clone(),
                    score: 0.0,
                    notes: note.clone(),
                })
                .collect();
            self.store.upsert_score(resume.id, job.id, 0.0, &detail).await?;
        }
        Ok(())
    }

    // ────────────────────────────────────────────────────────────────────────
    // Scoring
    // ────────────────────────────────────────────────────────────────────────

    /// Scores `text` against every job with at most `score_workers`
    /// evaluations in flight, persisting each result as it completes.
    /// Empty text is never scored.
    pub async fn score_for_jobs(
        &self,
        resume: Resume,
        text: &str,
        jobs: &[JobDescription],
        action: ActivityAction,
    ) -> Vec<ResumeScore> {
        if jobs.is_empty() {
            return Vec::new();
        }
        if text.trim().is_empty() {
            debug!("Resume {} has no text; skipping scoring", resume.id);
            return Vec::new();
        }

        let text: Arc<str> = Arc::from(text);
        let permits = Arc::new(Semaphore::new(self.config.score_workers.clamp(1, jobs.len())));
        let mut tasks = JoinSet::new();

        for job in jobs.iter().cloned() {
            let evaluator = self.evaluator.clone();
            let text = text.clone();
            let permits = permits.clone();
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let evaluation = evaluator.score(&text, &job).await;
                (job, evaluation)
            });
        }

        let mut resume = resume;
        let mut scores = Vec::with_capacity(jobs.len());
        while let Some(joined) = tasks.join_next().await {
            let (job, evaluation) = match joined {
                Ok(done) => done,
                Err(e) => {
                    error!("Scoring task for resume {} aborted: {e}", resume.id);
                    self.recorder
                        .record(
                            "score_for_jobs",
                            "Scoring task aborted",
                            &e.to_string(),
                            json!({ "resume_id": resume.id }),
                            Some(resume.id),
                        )
                        .await;
                    continue;
                }
            };

            match self.persist_evaluation(&mut resume, &job, evaluation, action).await {
                Ok(score) => scores.push(score),
                Err(e) => {
                    error!("Saving score for resume {} / job {} failed: {e:#}", resume.id, job.id);
                    self.recorder
                        .record(
                            "score_for_jobs",
                            &e.to_string(),
                            &format!("{e:?}"),
                            json!({ "resume_id": resume.id, "job_id": job.id }),
                            Some(resume.id),
                        )
                        .await;
                }
            }
        }
        scores
    }

    async fn persist_evaluation(
        &self,
        resume: &mut Resume,
        job: &JobDescription,
        evaluation: Evaluation,
        action: ActivityAction,
    ) -> Result<ResumeScore> {
        let update = merge_profile(resume, &evaluation.profile);
        if !update.is_empty() {
            match self.store.apply_profile(resume.id, &update).await {
                Ok(()) => {
                    debug!("Resume {}: filled {:?}", resume.id, update.changed_fields());
                    update.apply_to(resume);
                }
                Err(e) => {
                    warn!("Profile update for resume {} failed: {e:#}", resume.id);
                    self.recorder
                        .record(
                            "profile",
                            &e.to_string(),
                            "",
                            json!({ "fields": update.changed_fields() }),
                            Some(resume.id),
                        )
                        .await;
                }
            }
        }

        let score = self
            .store
            .upsert_score(resume.id, job.id, evaluation.total, &evaluation.detail)
            .await
            .with_context(|| format!("Failed to save score for job {}", job.id))?;

        let verb = match action {
            ActivityAction::Rescored => "Rescored",
            _ => "Scored",
        };
        self.recorder
            .activity(
                resume.id,
                action,
                &format!(
                    "{verb} {:.1} for {} ({})",
                    score.total_score,
                    job.name,
                    evaluation.method.as_str()
                ),
            )
            .await;

        if let Err(e) = self.automation.apply(&score).await {
            warn!("Automation for resume {} failed: {e:#}", resume.id);
            self.recorder
                .record(
                    "automation",
                    &e.to_string(),
                    "",
                    json!({ "score_id": score.id, "job_id": job.id }),
                    Some(resume.id),
                )
                .await;
        }

        Ok(score)
    }

    // ────────────────────────────────────────────────────────────────────────
    // Rescoring
    // ────────────────────────────────────────────────────────────────────────

    /// Re-evaluates one existing score from the resume's stored text.
    pub async fn rescore_score(&self, score_id: Uuid) -> Result<ResumeScore, RescoreError> {
        let score = self
            .store
            .get_score(score_id)
            .await?
            .ok_or(RescoreError::NotFound(score_id))?;
        let resume = self
            .store
            .get_resume(score.resume_id)
            .await?
            .ok_or(RescoreError::NotFound(score_id))?;
        let job = self
            .store
            .get_job(score.job_id)
            .await?
            .ok_or(RescoreError::NotFound(score_id))?;
        self.rescore_resume(resume, &job).await
    }

    async fn rescore_resume(
        &self,
        resume: Resume,
        job: &JobDescription,
    ) -> Result<ResumeScore, RescoreError> {
        if resume.text_content.trim().is_empty() {
            return Err(RescoreError::NoText(resume.id));
        }
        let resume_id = resume.id;
        let text = resume.text_content.clone();
        self.score_for_jobs(resume, &text, std::slice::from_ref(job), ActivityAction::Rescored)
            .await
            .into_iter()
            .next()
            .ok_or(RescoreError::Failed {
                resume_id,
                job_id: job.id,
            })
    }

    /// Rescores every resume that has text against one job.
    pub async fn rescore_job(&self, job_id: i64) -> Result<usize> {
        let job = self
            .store
            .get_job(job_id)
            .await?
            .with_context(|| format!("Job {job_id} not found"))?;
        let resumes = self.store.resumes_with_text().await?;
        if resumes.is_empty() {
            return Ok(0);
        }

        let job = Arc::new(job);
        let permits = Arc::new(Semaphore::new(self.config.max_workers.clamp(1, resumes.len())));
        let mut tasks = JoinSet::new();
        for resume in resumes {
            let ingestor = self.clone();
            let job = job.clone();
            let permits = permits.clone();
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let resume_id = resume.id;
                match ingestor.rescore_resume(resume, &job).await {
                    Ok(_) => true,
                    Err(e) => {
                        warn!("Rescore of resume {resume_id} for job {} failed: {e}", job.id);
                        false
                    }
                }
            });
        }

        let mut updated = 0;
        while let Some(joined) = tasks.join_next().await {
            if matches!(joined, Ok(true)) {
                updated += 1;
            }
        }
        info!("Rescored {updated} resume(s) for job {job_id}");
        Ok(updated)
    }

    /// Rescores keyword-fallback (or empty) scores with the LLM. Refuses to
    /// run without one, since the same keyword scorer would answer again.
    pub async fn rescore_fallback(&self, job_id: Option<i64>, limit: Option<usize>) -> Result<usize> {
        if !self.evaluator.has_llm() {
            bail!("No LLM backend configured; set ANTHROPIC_API_KEY to rescore fallback scores");
        }

        let mut targets: Vec<ResumeScore> = self
            .store
            .list_scores(job_id)
            .await?
            .into_iter()
            .filter(ResumeScore::is_fallback)
            .collect();
        if let Some(limit) = limit {
            targets.truncate(limit);
        }
        info!("Found {} fallback score(s) to rescore", targets.len());

        let mut updated = 0;
        for score in targets {
            match self.rescore_score(score.id).await {
                Ok(_) => updated += 1,
                Err(e) => warn!("Rescore of score {} failed: {e}", score.id),
            }
        }
        Ok(updated)
    }

    // ────────────────────────────────────────────────────────────────────────
    // Text backfill
    // ────────────────────────────────────────────────────────────────────────

    /// Re-extracts text for resumes saved without any.
    pub async fn backfill_text(&self, limit: Option<i64>) -> Result<usize> {
        let resumes = self.store.resumes_missing_text(limit).await?;
        let mut filled = 0;
        for resume in &resumes {
            if self.populate_text(resume).await {
                filled += 1;
            }
        }
        info!("Backfilled text for {filled}/{} resume(s)", resumes.len());
        Ok(filled)
    }

    /// Fetches the stored file and saves freshly extracted text. Returns
    /// whether text was saved.
    pub async fn populate_text(&self, resume: &Resume) -> bool {
        if !resume.text_content.trim().is_empty() || resume.file_url.is_empty() {
            return false;
        }
        let outcome = async {
            let content = self.fetch_file(&resume.file_url).await?;
            let text = self
                .extractor
                .extract(&resume.attachment_name, content, &self.recorder)
                .await;
            if text.is_empty() {
                return Ok(false);
            }
            self.store.set_text_content(resume.id, &text).await?;
            Ok::<_, anyhow::Error>(true)
        }
        .await;

        match outcome {
            Ok(saved) => saved,
            Err(e) => {
                warn!("Text backfill for resume {} failed: {e:#}", resume.id);
                self.recorder
                    .record(
                        "populate_resume_text",
                        &e.to_string(),
                        &format!("{e:?}"),
                        json!({ "file_url": resume.file_url }),
                        Some(resume.id),
                    )
                    .await;
                false
            }
        }
    }

    async fn fetch_file(&self, file_url: &str) -> Result<Bytes> {
        if file_url.starts_with("http") {
            let response = self.http.get(file_url).send().await?.error_for_status()?;
            return Ok(response.bytes().await?);
        }
        Ok(self.blobs.download(file_url).await?)
    }
}

/// Fill-empty merge of an evaluator profile onto a resume. A name that is
/// still the filename stem counts as empty.
fn merge_profile(resume: &Resume, profile: &CandidateProfile) -> ProfileUpdate {
    fn fill(current: &str, incoming: &Option<String>, max: usize) -> Option<String> {
        if !current.is_empty() {
            return None;
        }
        let value = truncate_chars(&clean_string(incoming.as_deref()?), max);
        (!value.is_empty()).then_some(value)
    }

    let name = if resume.candidate_name == filename_stem(&resume.attachment_name) {
        ""
    } else {
        resume.candidate_name.as_str()
    };
    let name_update = fill(name, &profile.name, MAX_NAME_LEN)
        .filter(|value| *value != resume.candidate_name);

    ProfileUpdate {
        candidate_name: name_update,
        candidate_email: fill(
            resume.candidate_email.as_deref().unwrap_or_default(),
            &profile.email,
            MAX_NAME_LEN,
        ),
        candidate_phone: fill(&resume.candidate_phone, &profile.phone, MAX_NAME_LEN),
        linkedin_url: fill(&resume.linkedin_url, &profile.linkedin_url, MAX_FILE_URL_LEN),
        candidate_role: fill(&resume.candidate_role, &profile.current_role, MAX_NAME_LEN),
        candidate_company: fill(&resume.candidate_company, &profile.current_company, MAX_NAME_LEN),
        candidate_location: fill(&resume.candidate_location, &profile.location, MAX_NAME_LEN),
    }
}
