use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Note carried by every detail entry produced by the keyword scorer.
pub const FALLBACK_NOTE: &str = "Fallback keyword match";

/// One entry of the persisted score breakdown. Other components read this
/// shape directly, so field names are part of the storage contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionResult {
    pub criterion_id: i64,
    pub title: String,
    /// 0–10.
    pub score: f64,
    #[serde(default)]
    pub notes: String,
}

/// Score of one resume against one job; unique per `(resume_id, job_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeScore {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub job_id: i64,
    /// 0–100.
    pub total_score: f64,
    pub detail: Vec<CriterionResult>,
    pub created_at: DateTime<Utc>,
}

impl ResumeScore {
    /// True when the breakdown is empty or came from the keyword scorer,
    /// i.e. the score is a candidate for an LLM rescore.
    pub fn is_fallback(&self) -> bool {
        self.detail.is_empty()
            || self
                .detail
                .iter()
                .any(|d| d.notes.to_lowercase().starts_with("fallback"))
    }
}
