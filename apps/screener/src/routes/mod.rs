pub mod health;
pub mod resumes;
pub mod scores;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/jobs/:job_id/resumes", post(resumes::handle_upload))
        .route("/api/v1/resumes/:id/file", get(resumes::handle_resume_file))
        .route("/api/v1/scores/:id/rescore", post(scores::handle_rescore))
        .with_state(state)
}
