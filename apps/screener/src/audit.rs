//! Side-channel audit trail: the append-only error log and the per-resume
//! activity log. Neither may fail the caller; a write that cannot reach the
//! store is reported through `tracing` instead.

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, warn};
use uuid::Uuid;

use crate::models::audit::{ActivityAction, NewErrorLog};
use crate::models::resume::truncate_chars;
use crate::store::ScreeningStore;

const MAX_MESSAGE_LEN: usize = 500;
const MAX_DETAILS_LEN: usize = 2000;

#[derive(Clone)]
pub struct ErrorRecorder {
    store: Arc<dyn ScreeningStore>,
}

impl ErrorRecorder {
    pub fn new(store: Arc<dyn ScreeningStore>) -> Self {
        Self { store }
    }

    /// Appends an error-log row. Never fails.
    pub async fn record(
        &self,
        location: &str,
        message: &str,
        details: &str,
        context: Value,
        resume_id: Option<Uuid>,
    ) {
        let entry = NewErrorLog {
            location: location.to_string(),
            message: truncate_chars(message, MAX_MESSAGE_LEN),
            details: truncate_chars(details, MAX_DETAILS_LEN),
            context,
            resume_id,
            resolved: false,
        };
        if let Err(e) = self.store.record_error(&entry).await {
            error!(
                "Failed to persist error log at {location}: {e:#} (original: {})",
                entry.message
            );
        }
    }

    /// Appends an activity-log row. Never fails.
    pub async fn activity(&self, resume_id: Uuid, action: ActivityAction, details: &str) {
        if let Err(e) = self.store.log_activity(resume_id, action, details).await {
            warn!("Failed to log {action} for resume {resume_id}: {e:#}");
        }
    }
}
