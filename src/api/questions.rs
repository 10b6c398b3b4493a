//! Question feed endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use super::{QuestionResponse, QuestionsResponse, QUESTION_PAGE_SIZE};
use crate::errors::AppError;
use crate::models::Category;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuestionsQuery {
    pub category: Option<String>,
}

/// GET /api/questions - Newest questions, optionally for one category.
///
/// A category nobody can have published under matches nothing.
pub async fn list_questions(
    State(state): State<AppState>,
    Query(query): Query<ListQuestionsQuery>,
) -> Result<Json<QuestionsResponse>, AppError> {
    let category = match query.category.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(tag) => match Category::parse(tag) {
            Some(category) => Some(category),
            None => {
                tracing::debug!(category = tag, "Unknown category filter");
                return Ok(Json(QuestionsResponse {
                    questions: Vec::new(),
                }));
            }
        },
    };

    let questions = state.repo.list_questions(category, QUESTION_PAGE_SIZE).await?;
    Ok(Json(QuestionsResponse { questions }))
}

/// GET /api/question/:id - A single question.
pub async fn get_question(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<QuestionResponse>, AppError> {
    match state.repo.get_question(&id).await? {
        Some(question) => Ok(Json(QuestionResponse { question })),
        None => Err(AppError::NotFound("Question not found".to_string())),
    }
}
