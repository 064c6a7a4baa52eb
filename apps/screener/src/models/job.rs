use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One atomic requirement of a job, scored independently.
/// `id` is echoed back by the evaluator to correlate results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Criterion {
    pub id: i64,
    pub job_id: i64,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescription {
    pub id: i64,
    pub name: String,
    pub summary: String,
    pub active: bool,
    /// Ordered by criterion id.
    pub criteria: Vec<Criterion>,
}
