//! Submission endpoint.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use super::SubmitResponse;
use crate::errors::AppError;
use crate::models::SubmitRequest;
use crate::AppState;

/// POST /api/submit - Moderate, illustrate and publish a question.
pub async fn submit_question(
    State(state): State<AppState>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Json<SubmitResponse>, AppError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::debug!(error = %rejection, "Unreadable submit body");
        AppError::Validation("Invalid request body".to_string())
    })?;

    let text = request
        .text
        .ok_or_else(|| AppError::Validation("Question text is required".to_string()))?;

    let question = state.pipeline.submit(&text).await?;

    Ok(Json(SubmitResponse {
        success: true,
        question,
    }))
}
