use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Longest `file_url` the resumes table accepts.
pub const MAX_FILE_URL_LEN: usize = 2000;
pub const MAX_NAME_LEN: usize = 255;

/// Screening workflow state of a resume.
///
/// Only `PENDING`/`NEW`/`AUTO_REJECTED` are entered automatically; every other
/// state is set by a recruiter and is respected by the automation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResumeStatus {
    New,
    Pending,
    Shortlisted,
    AutoRejected,
    Rejected,
    InterviewScheduled,
    InterviewPassed,
    InterviewRejected,
    Hired,
}

impl ResumeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResumeStatus::New => "NEW",
            ResumeStatus::Pending => "PENDING",
            ResumeStatus::Shortlisted => "SHORTLISTED",
            ResumeStatus::AutoRejected => "AUTO_REJECTED",
            ResumeStatus::Rejected => "REJECTED",
            ResumeStatus::InterviewScheduled => "INTERVIEW_SCHEDULED",
            ResumeStatus::InterviewPassed => "INTERVIEW_PASSED",
            ResumeStatus::InterviewRejected => "INTERVIEW_REJECTED",
            ResumeStatus::Hired => "HIRED",
        }
    }
}

impl fmt::Display for ResumeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResumeStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "NEW" => ResumeStatus::New,
            "PENDING" => ResumeStatus::Pending,
            "SHORTLISTED" => ResumeStatus::Shortlisted,
            "AUTO_REJECTED" => ResumeStatus::AutoRejected,
            "REJECTED" => ResumeStatus::Rejected,
            "INTERVIEW_SCHEDULED" => ResumeStatus::InterviewScheduled,
            "INTERVIEW_PASSED" => ResumeStatus::InterviewPassed,
            "INTERVIEW_REJECTED" => ResumeStatus::InterviewRejected,
            "HIRED" => ResumeStatus::Hired,
            other => anyhow::bail!("unknown resume status '{other}'"),
        })
    }
}

/// Channel a resume arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeSource {
    Email,
    Upload,
    Manual,
}

impl ResumeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResumeSource::Email => "email",
            ResumeSource::Upload => "upload",
            ResumeSource::Manual => "manual",
        }
    }
}

impl fmt::Display for ResumeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResumeSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "email" => ResumeSource::Email,
            "upload" => ResumeSource::Upload,
            "manual" => ResumeSource::Manual,
            other => anyhow::bail!("unknown resume source '{other}'"),
        })
    }
}

/// One unit of raw resume bytes plus provenance, consumed once by the ingestor.
#[derive(Debug, Clone)]
pub struct AttachmentPayload {
    pub batch_id: String,
    pub sender: Option<String>,
    pub attachment_name: String,
    pub received_at: DateTime<Utc>,
    pub content: Bytes,
    pub source: ResumeSource,
}

impl AttachmentPayload {
    /// Object-storage key: `resumes/{batch_id}/{attachment_name}`.
    pub fn storage_key(&self) -> String {
        format!("resumes/{}/{}", self.batch_id, self.attachment_name)
    }

    /// Filename without its extension, used as a provisional candidate name.
    pub fn name_stem(&self) -> String {
        filename_stem(&self.attachment_name)
    }
}

/// `"Jane Doe CV.pdf"` -> `"Jane Doe CV"`, cleaned and bounded to the name column.
pub fn filename_stem(filename: &str) -> String {
    let stem = match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => filename,
    };
    truncate_chars(&clean_string(stem), MAX_NAME_LEN)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resume {
    pub id: Uuid,
    pub batch_id: String,
    pub attachment_name: String,
    pub sender: Option<String>,
    pub candidate_name: String,
    pub candidate_email: Option<String>,
    pub candidate_phone: String,
    pub linkedin_url: String,
    pub candidate_role: String,
    pub candidate_company: String,
    pub candidate_location: String,
    pub source: ResumeSource,
    pub is_active_seeker: bool,
    pub is_favorite: bool,
    pub text_content: String,
    pub file_url: String,
    pub received_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub status: ResumeStatus,
    pub rejection_email_sent: bool,
    pub interview_email_sent: bool,
    pub human_score: Option<f64>,
    pub human_score_breakdown: Value,
}

/// Insert parameters for a never-before-seen candidate.
#[derive(Debug, Clone)]
pub struct NewResume {
    pub batch_id: String,
    pub attachment_name: String,
    pub sender: Option<String>,
    pub candidate_name: String,
    pub candidate_email: Option<String>,
    pub candidate_phone: String,
    pub source: ResumeSource,
    pub is_active_seeker: bool,
    pub text_content: String,
    pub file_url: String,
    pub received_at: DateTime<Utc>,
    pub status: ResumeStatus,
}

/// Full replacement values written when a known candidate submits again.
/// Status goes back to `PENDING` and the human override is cleared by the store.
#[derive(Debug, Clone)]
pub struct Resubmission {
    pub batch_id: String,
    pub attachment_name: String,
    pub sender: Option<String>,
    pub candidate_name: String,
    pub candidate_email: Option<String>,
    pub candidate_phone: String,
    pub is_active_seeker: bool,
    pub text_content: String,
    pub file_url: String,
    pub received_at: DateTime<Utc>,
}

/// Profile fields to write; `None` means "leave the column alone".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileUpdate {
    pub candidate_name: Option<String>,
    pub candidate_email: Option<String>,
    pub candidate_phone: Option<String>,
    pub linkedin_url: Option<String>,
    pub candidate_role: Option<String>,
    pub candidate_company: Option<String>,
    pub candidate_location: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }

    /// Column names this update touches, in a stable order.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        [
            ("candidate_name", self.candidate_name.is_some()),
            ("candidate_email", self.candidate_email.is_some()),
            ("candidate_phone", self.candidate_phone.is_some()),
            ("linkedin_url", self.linkedin_url.is_some()),
            ("candidate_role", self.candidate_role.is_some()),
            ("candidate_company", self.candidate_company.is_some()),
            ("candidate_location", self.candidate_location.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }

    /// Applies the update to an in-memory copy so later merges see it.
    pub fn apply_to(&self, resume: &mut Resume) {
        if let Some(v) = &self.candidate_name {
            resume.candidate_name = v.clone();
        }
        if let Some(v) = &self.candidate_email {
            resume.candidate_email = Some(v.clone());
        }
        if let Some(v) = &self.candidate_phone {
            resume.candidate_phone = v.clone();
        }
        if let Some(v) = &self.linkedin_url {
            resume.linkedin_url = v.clone();
        }
        if let Some(v) = &self.candidate_role {
            resume.candidate_role = v.clone();
        }
        if let Some(v) = &self.candidate_company {
            resume.candidate_company = v.clone();
        }
        if let Some(v) = &self.candidate_location {
            resume.candidate_location = v.clone();
        }
    }
}

/// Removes NUL bytes (Postgres rejects them in TEXT) and trims.
pub fn clean_string(value: &str) -> String {
    value.replace('\0', "").trim().to_string()
}

pub fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

/// Candidates applying themselves (uploads, LinkedIn relays, or mail sent from
/// the address on the resume) are treated as active seekers.
pub fn infer_active_seeker(
    sender: Option<&str>,
    candidate_email: Option<&str>,
    source: ResumeSource,
) -> bool {
    if source == ResumeSource::Upload {
        return true;
    }
    let sender = sender.unwrap_or_default().to_lowercase();
    let email = candidate_email.unwrap_or_default().to_lowercase();
    if sender.contains("linkedin") {
        return true;
    }
    !sender.is_empty() && sender == email
}
