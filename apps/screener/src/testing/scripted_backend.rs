use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::llm_client::{CompletionBackend, LlmError};

/// Completion backend that answers every prompt with the same canned reply
/// (or the same error) and counts calls.
pub struct ScriptedBackend {
    reply: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fails every call with a 500 from the API.
    pub fn failing() -> Self {
        Self {
            reply: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared call counter; stays valid after the backend is moved into an
    /// evaluator.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, _prompt: &str, _system: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone().ok_or(LlmError::Api {
            status: 500,
            message: "scripted failure".to_string(),
        })
    }
}
