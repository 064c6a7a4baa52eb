use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::job::Criterion;
use crate::models::score::{CriterionResult, FALLBACK_NOTE};

static TOKEN_SPLIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,;/\n]+").expect("split regex"));

const MIN_TOKEN_CHARS: usize = 3;

/// Deterministic overlap scorer used when the LLM path is unavailable.
///
/// Each criterion is split into tokens; its 0–10 score is the share of
/// distinct tokens found in the resume. The total is the mean of the
/// per-criterion percentages, 0 when there are no criteria.
pub fn keyword_score(resume_text: &str, criteria: &[Criterion]) -> (f64, Vec<CriterionResult>) {
    let haystack = resume_text.to_lowercase();

    let detail: Vec<CriterionResult> = criteria
        .iter()
        .map(|criterion| {
            let tokens = tokens(&criterion.detail);
            let score = if tokens.is_empty() {
                0.0
            } else {
                let hits = tokens.iter().filter(|t| haystack.contains(t.as_str())).count();
                (10.0 * hits as f64 / tokens.len() as f64).min(10.0)
            };
            CriterionResult {
                criterion_id: criterion.id,
                title: criterion.detail.clone(),
                score,
                notes: FALLBACK_NOTE.to_string(),
            }
        })
        .collect();

    let total = if detail.is_empty() {
        0.0
    } else {
        detail.iter().map(|d| d.score * 10.0).sum::<f64>() / detail.len() as f64
    };
    (total, detail)
}

fn tokens(detail: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for token in TOKEN_SPLIT_RE.split(detail) {
        let token = token.trim().to_lowercase();
        if token.chars().count() >= MIN_TOKEN_CHARS && !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens
}
