use axum::extract::{Multipart, Path, State};
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::mail::is_allowed_attachment;
use crate::models::resume::{AttachmentPayload, ResumeSource};
use crate::models::score::ResumeScore;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub received: usize,
    pub saved: usize,
    /// Scores for this job, highest first.
    pub scores: Vec<ResumeScore>,
}

#[derive(Debug, Serialize)]
pub struct FileUrlResponse {
    pub url: String,
}

/// POST /api/v1/jobs/:job_id/resumes
///
/// Every file part becomes its own batch (`upload-{uuid}`) and is scored
/// against this job only.
pub async fn handle_upload(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let job = state
        .store
        .get_job(job_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job {job_id}")))?;

    let mut attachments = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.to_string()))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        if !is_allowed_attachment(&filename) {
            return Err(AppError::Validation(format!(
                "Unsupported file type: {filename}"
            )));
        }
        let content = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Invalid file {filename}: {e}")))?;
        attachments.push(AttachmentPayload {
            batch_id: format!("upload-{}", Uuid::new_v4()),
            sender: None,
            attachment_name: filename,
            received_at: Utc::now(),
            content,
            source: ResumeSource::Upload,
        });
    }

    if attachments.is_empty() {
        return Err(AppError::Validation("No files uploaded".to_string()));
    }

    let received = attachments.len();
    let batch_ids: Vec<String> = attachments.iter().map(|a| a.batch_id.clone()).collect();
    info!("Upload of {received} file(s) for job {job_id}");

    let saved = state.ingestor.ingest(attachments, Some(vec![job])).await?;
    let scores = state.store.scores_for_batches(&batch_ids, job_id).await?;

    Ok(Json(UploadResponse {
        received,
        saved,
        scores,
    }))
}

/// GET /api/v1/resumes/:id/file
pub async fn handle_resume_file(
    State(state): State<AppState>,
    Path(resume_id): Path<Uuid>,
) -> Result<Json<FileUrlResponse>, AppError> {
    let resume = state
        .store
        .get_resume(resume_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {resume_id}")))?;

    if resume.file_url.is_empty() {
        return Err(AppError::NotFound(format!(
            "Resume {resume_id} has no stored file"
        )));
    }

    let url = if resume.file_url.starts_with("http://") || resume.file_url.starts_with("https://") {
        resume.file_url
    } else {
        state.blobs.signed_url(&resume.file_url).await
    };
    Ok(Json(FileUrlResponse { url }))
}
