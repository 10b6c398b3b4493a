//! REST API module.
//!
//! Handlers for the public question feed, the daily limits and submissions.

mod limits;
mod questions;
mod submit;

pub use limits::*;
pub use questions::*;
pub use submit::*;

use serde::Serialize;

use crate::models::Question;

/// Most questions a single list request returns.
pub const QUESTION_PAGE_SIZE: i64 = 100;

#[derive(Debug, Serialize)]
pub struct QuestionsResponse {
    pub questions: Vec<Question>,
}

#[derive(Debug, Serialize)]
pub struct QuestionResponse {
    pub question: Question,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub question: Question,
}
