use serde_json::json;

use crate::models::job::JobDescription;
use crate::models::resume::truncate_chars;

/// Characters of resume text sent to the model.
pub const MAX_RESUME_CHARS: usize = 12_000;

/// System prompt that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

const SCORING_INSTRUCTIONS: &str = "\
You are an HR specialist screening a resume against a job's criteria.

1. Extract the candidate profile. Use JSON null for any field that is not \
explicitly present in the resume; never guess.
2. Score EVERY criterion on a 0-10 scale using only evidence in the resume \
(0 = no evidence, 10 = strong, direct evidence). Do not rewrite criteria. \
Give a one-sentence justification in `notes`.
3. For `linkedin_url`, copy the LONGEST complete profile URL found in the \
text (including any trailing id), never a truncated fragment.

Respond with exactly this shape:
{
  \"profile\": {
    \"name\": string|null,
    \"email\": string|null,
    \"phone\": string|null,
    \"linkedin_url\": string|null,
    \"current_role\": string|null,
    \"current_company\": string|null,
    \"location\": string|null
  },
  \"criteria\": [
    {\"criterion_id\": <id from the list>, \"score\": <0-10>, \"notes\": \"short why\"}
  ]
}";

pub fn scoring_prompt(resume_text: &str, job: &JobDescription) -> String {
    let criteria: Vec<_> = job
        .criteria
        .iter()
        .map(|c| json!({ "id": c.id, "detail": c.detail }))
        .collect();

    format!(
        "{SCORING_INSTRUCTIONS}\n\nJob: {}\nSummary: {}\nCriteria: {}\n\nResume:\n{}",
        job.name,
        job.summary,
        serde_json::Value::Array(criteria),
        truncate_chars(resume_text, MAX_RESUME_CHARS)
    )
}
