//! Moderation client.
//!
//! Asks an OpenAI-compatible chat-completions endpoint whether a submission
//! is an acceptable question, and if so for a cleaned-up text and a category.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::models::{Category, ModerationResult, RawVerdict, DEFAULT_REJECTION_REASON};

/// Longest cleaned text we are willing to publish.
const MAX_CLEANED_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("moderation service is not configured")]
    NotConfigured,
    #[error("moderation request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("moderation service returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("moderation service returned no content")]
    EmptyResponse,
    #[error("malformed moderation verdict: {0}")]
    Malformed(String),
}

/// Classifies one submission. Implementations must not retry.
#[async_trait]
pub trait Moderator: Send + Sync {
    async fn moderate(&self, text: &str) -> Result<ModerationResult, ModerationError>;
}

/// Build the curator instruction for one submission.
pub fn build_prompt(text: &str) -> String {
    let categories = Category::ALL
        .iter()
        .map(Category::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"You are a curator for a question-sharing app called "Nice Questions."
Your job is to evaluate submitted questions and decide if they belong.

ACCEPT most questions. Only reject if the submission:
- Is NOT a question (statements, commands, random text)
- Contains violence, hate speech, or explicit content
- Is obvious spam or gibberish

Yes/no questions are fine. Vague questions are fine. Simple questions are fine.
Be very permissive - when in doubt, accept it.

If accepted, clean it up (fix grammar, punctuation, capitalization) and categorize it.

Categories: {categories}

Respond in JSON format:
{{
  "accepted": true/false,
  "cleanedText": "The cleaned question text (only if accepted)",
  "category": "category name (only if accepted)",
  "reason": "Brief reason if rejected"
}}

User's submitted question: "{text}""#
    )
}

/// Turn the classifier's JSON answer into a [`ModerationResult`].
///
/// An acceptance must carry a usable text and a known category; anything
/// else is malformed, not a rejection.
pub fn interpret_verdict(content: &str) -> Result<ModerationResult, ModerationError> {
    let verdict: RawVerdict =
        serde_json::from_str(content).map_err(|e| ModerationError::Malformed(e.to_string()))?;

    if !verdict.accepted {
        let reason = verdict
            .reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_REJECTION_REASON.to_string());
        return Ok(ModerationResult::Rejected { reason });
    }

    let cleaned_text = verdict
        .cleaned_text
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ModerationError::Malformed("accepted without cleanedText".into()))?;

    if cleaned_text.chars().count() > MAX_CLEANED_CHARS {
        return Err(ModerationError::Malformed(format!(
            "cleanedText longer than {} characters",
            MAX_CLEANED_CHARS
        )));
    }

    let category_tag = verdict
        .category
        .ok_or_else(|| ModerationError::Malformed("accepted without category".into()))?;
    let category = Category::from_header(&category_tag)
        .ok_or_else(|| ModerationError::Malformed(format!("unknown category {:?}", category_tag)))?;

    Ok(ModerationResult::Accepted {
        cleaned_text,
        category,
    })
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Moderator backed by a chat-completions endpoint.
pub struct OpenAiModerator {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl OpenAiModerator {
    pub fn new(
        http: reqwest::Client,
        api_key: Option<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_key,
            base_url: base_url.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl Moderator for OpenAiModerator {
    async fn moderate(&self, text: &str) -> Result<ModerationResult, ModerationError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ModerationError::NotConfigured)?;

        tracing::debug!(model = %self.model, chars = text.chars().count(), "Calling moderation service");

        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": build_prompt(text) }],
            "response_format": { "type": "json_object" },
            "temperature": 0.3,
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%status, "Moderation service returned an error status");
            return Err(ModerationError::Status(status));
        }

        let completion: ChatCompletionResponse = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ModerationError::EmptyResponse)?;

        interpret_verdict(&content)
    }
}
