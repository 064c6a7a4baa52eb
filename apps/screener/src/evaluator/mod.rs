//! Evaluator: scores resume text against one job's criteria.
//!
//! With an LLM backend configured, a single prompt both extracts a candidate
//! profile and scores each criterion 0–10. The reply is parsed defensively
//! and the total is always recomputed locally. Without a backend, or on any
//! backend or contract failure, the deterministic keyword scorer answers.

mod keyword;
mod parse;
pub mod prompts;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::extraction::contact;
use crate::llm_client::CompletionBackend;
use crate::models::job::JobDescription;
use crate::models::score::CriterionResult;

pub use keyword::keyword_score;

/// Note on detail entries the model left out of its reply.
pub const NOT_SCORED_NOTE: &str = "Not scored by model";

const NULL_SENTINELS: &[&str] = &["null", "none", "n/a", "na", "unknown", "not provided", "-"];

// ────────────────────────────────────────────────────────────────────────────
// Output data models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringMethod {
    Llm,
    Keyword,
}

impl ScoringMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringMethod::Llm => "llm",
            ScoringMethod::Keyword => "keyword",
        }
    }
}

/// Best-effort contact and role metadata pulled from the resume.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub linkedin_url: Option<String>,
    pub current_role: Option<String>,
    pub current_company: Option<String>,
    pub location: Option<String>,
}

impl CandidateProfile {
    /// Reads the model's `profile` object, mapping null sentinels
    /// ("null", "N/A", blank, ...) to `None`.
    fn from_value(value: &Value) -> Self {
        let field = |key: &str| value.get(key).and_then(normalize_field);
        Self {
            name: field("name"),
            email: field("email"),
            phone: field("phone"),
            linkedin_url: field("linkedin_url").or_else(|| field("linkedin")),
            current_role: field("current_role"),
            current_company: field("current_company"),
            location: field("location"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &CandidateProfile::default()
    }
}

fn normalize_field(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let lowered = text.to_lowercase();
    if text.is_empty() || NULL_SENTINELS.contains(&lowered.as_str()) {
        None
    } else {
        Some(text)
    }
}

#[derive(Debug, Clone)]
pub struct Evaluation {
    /// 0–100.
    pub total: f64,
    pub detail: Vec<CriterionResult>,
    pub profile: CandidateProfile,
    pub method: ScoringMethod,
}

// ────────────────────────────────────────────────────────────────────────────
// Evaluator
// ────────────────────────────────────────────────────────────────────────────

/// Cloned once per scoring task; clones share the backend's connection pool
/// but no mutable state.
#[derive(Clone)]
pub struct Evaluator {
    backend: Option<Arc<dyn CompletionBackend>>,
}

impl Evaluator {
    pub fn new(backend: Option<Arc<dyn CompletionBackend>>) -> Self {
        Self { backend }
    }

    pub fn has_llm(&self) -> bool {
        self.backend.is_some()
    }

    pub async fn score(&self, resume_text: &str, job: &JobDescription) -> Evaluation {
        if job.criteria.is_empty() {
            return Evaluation {
                total: 0.0,
                detail: Vec::new(),
                profile: CandidateProfile::default(),
                method: ScoringMethod::Keyword,
            };
        }

        let Some(backend) = &self.backend else {
            return fallback(resume_text, job);
        };

        let prompt = prompts::scoring_prompt(resume_text, job);
        let raw = match backend.complete(&prompt, prompts::JSON_ONLY_SYSTEM).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("LLM scoring failed for job {}: {e}; using keyword fallback", job.id);
                return fallback(resume_text, job);
            }
        };

        match parse::parse_reply(&raw).and_then(|reply| from_reply(&reply, resume_text, job)) {
            Some(evaluation) => evaluation,
            None => {
                warn!(
                    "Unparseable LLM reply for job {} ({} chars); using keyword fallback",
                    job.id,
                    raw.len()
                );
                debug!("Raw reply: {raw}");
                fallback(resume_text, job)
            }
        }
    }
}

fn fallback(resume_text: &str, job: &JobDescription) -> Evaluation {
    let (total, detail) = keyword_score(resume_text, &job.criteria);
    Evaluation {
        total: total.clamp(0.0, 100.0),
        detail,
        profile: CandidateProfile::default(),
        method: ScoringMethod::Keyword,
    }
}

/// Correlates the reply's entries back to the job's criteria by id. Unknown
/// ids are dropped; missing criteria score 0. A reply without a `criteria`
/// array does not satisfy the contract.
fn from_reply(reply: &Value, resume_text: &str, job: &JobDescription) -> Option<Evaluation> {
    let entries = reply.get("criteria")?.as_array()?;

    let mut scored: HashMap<i64, (f64, String)> = HashMap::new();
    for entry in entries {
        let Some(id) = entry
            .get("criterion_id")
            .or_else(|| entry.get("id"))
            .and_then(parse::lenient_i64)
        else {
            continue;
        };
        let score = entry
            .get("score")
            .and_then(parse::lenient_f64)
            .unwrap_or(0.0)
            .clamp(0.0, 10.0);
        let notes = entry
            .get("notes")
            .or_else(|| entry.get("justification"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();
        scored.entry(id).or_insert((score, notes));
    }

    let detail: Vec<CriterionResult> = job
        .criteria
        .iter()
        .map(|criterion| {
            let (score, notes) = scored
                .remove(&criterion.id)
                .unwrap_or_else(|| (0.0, NOT_SCORED_NOTE.to_string()));
            CriterionResult {
                criterion_id: criterion.id,
                title: criterion.detail.clone(),
                score,
                notes,
            }
        })
        .collect();

    if !scored.is_empty() {
        debug!("Dropped {} reply entries with unknown criterion ids", scored.len());
    }

    let mut profile = reply
        .get("profile")
        .map(CandidateProfile::from_value)
        .unwrap_or_default();
    profile.linkedin_url = longest(profile.linkedin_url, contact::extract_profile_link(resume_text));

    Some(Evaluation {
        total: normalized_total(&detail, job.criteria.len()),
        detail,
        profile,
        method: ScoringMethod::Llm,
    })
}

/// `100 × Σscore / (10 × criterion_count)`, clamped to 0–100.
pub fn normalized_total(detail: &[CriterionResult], criterion_count: usize) -> f64 {
    if criterion_count == 0 {
        return 0.0;
    }
    let sum: f64 = detail.iter().map(|d| d.score).sum();
    (100.0 * sum / (10.0 * criterion_count as f64)).clamp(0.0, 100.0)
}

fn longest(a: Option<String>, b: Option<String>) -> Option<String> {
    match (a, b) {
        (Some(a), Some(b)) if b.len() > a.len() => Some(b),
        (Some(a), _) => Some(a),
        (None, b) => b,
    }
}
