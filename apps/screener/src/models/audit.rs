use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Activity-log action types recorded against a resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityAction {
    Ingested,
    Scored,
    Rescored,
    StatusChange,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::Ingested => "INGESTED",
            ActivityAction::Scored => "SCORED",
            ActivityAction::Rescored => "RESCORED",
            ActivityAction::StatusChange => "STATUS_CHANGE",
        }
    }
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only error-log row for a recoverable failure. `resolved` is
/// flipped by an operator once the failure has been dealt with.
#[derive(Debug, Clone, Serialize)]
pub struct NewErrorLog {
    pub location: String,
    pub message: String,
    pub details: String,
    pub context: Value,
    pub resume_id: Option<Uuid>,
    pub resolved: bool,
}
