use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::score::ResumeScore;
use crate::state::AppState;

/// POST /api/v1/scores/:id/rescore
pub async fn handle_rescore(
    State(state): State<AppState>,
    Path(score_id): Path<Uuid>,
) -> Result<Json<ResumeScore>, AppError> {
    let score = state.ingestor.rescore_score(score_id).await?;
    Ok(Json(score))
}
