//! Submission pipeline.
//!
//! Turns raw submitted text into a published [`Question`] or a typed failure.
//! A submission walks the states
//! `Received → AttemptGateChecked → Moderated → AcceptGateChecked → Illustrated → Persisted`
//! and may exit at any of them. Nothing is retried here and nothing is
//! rolled back: an attempt consumed at the first gate stays consumed, and an
//! image uploaded before a failed insert stays in storage.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::clock::Clock;
use crate::config::QuotaLimits;
use crate::db::Repository;
use crate::errors::AppError;
use crate::illustration::{IllustrationError, IllustrationSourcer};
use crate::models::{ModerationResult, NewQuestion, Question};
use crate::moderation::{ModerationError, Moderator};
use crate::quota::QuotaStore;
use crate::storage::{new_image_path, ObjectStore, StorageError};

pub const MIN_TEXT_CHARS: usize = 10;
pub const MAX_TEXT_CHARS: usize = 200;

/// Where a submission has got to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStage {
    Received,
    AttemptGateChecked,
    Moderated,
    AcceptGateChecked,
    Illustrated,
    Persisted,
}

/// Which daily cap stopped a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaGate {
    Attempts,
    Accepted,
}

impl fmt::Display for QuotaGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotaGate::Attempts => f.write_str("attempts"),
            QuotaGate::Accepted => f.write_str("accepted"),
        }
    }
}

/// Failure of a collaborator the pipeline depends on.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error(transparent)]
    Moderation(#[from] ModerationError),
    #[error(transparent)]
    Illustration(#[from] IllustrationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Database(#[from] AppError),
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("{0}")]
    Validation(String),
    #[error("daily {0} limit reached")]
    RateLimited(QuotaGate),
    #[error("rejected: {0}")]
    Rejected(String),
    /// `stage` is the last state reached before the failing step.
    #[error("submission failed after {stage:?}: {source}")]
    Upstream {
        stage: SubmissionStage,
        #[source]
        source: UpstreamError,
    },
}

fn upstream(stage: SubmissionStage, err: impl Into<UpstreamError>) -> SubmitError {
    SubmitError::Upstream {
        stage,
        source: err.into(),
    }
}

/// Check the shape of a submission and return the trimmed text.
///
/// The lower bound applies to the trimmed text, the upper bound to the text
/// as submitted.
pub fn validate_text(raw: &str) -> Result<&str, SubmitError> {
    let text = raw.trim();

    if text.chars().count() < MIN_TEXT_CHARS {
        return Err(SubmitError::Validation(format!(
            "Question must be at least {} characters",
            MIN_TEXT_CHARS
        )));
    }
    if raw.chars().count() > MAX_TEXT_CHARS {
        return Err(SubmitError::Validation(format!(
            "Question must be {} characters or less",
            MAX_TEXT_CHARS
        )));
    }

    Ok(text)
}

/// Knobs that shape one pipeline run.
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub limits: QuotaLimits,
    pub image_max_retries: u32,
}

pub struct SubmissionPipeline {
    repo: Arc<Repository>,
    quota: QuotaStore,
    moderator: Arc<dyn Moderator>,
    sourcer: IllustrationSourcer,
    store: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
    settings: PipelineSettings,
}

impl SubmissionPipeline {
    pub fn new(
        repo: Arc<Repository>,
        moderator: Arc<dyn Moderator>,
        sourcer: IllustrationSourcer,
        store: Arc<dyn ObjectStore>,
        clock: Arc<dyn Clock>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            quota: QuotaStore::new(repo.clone(), clock.clone()),
            repo,
            moderator,
            sourcer,
            store,
            clock,
            settings,
        }
    }

    pub fn quota(&self) -> &QuotaStore {
        &self.quota
    }

    pub fn limits(&self) -> QuotaLimits {
        self.settings.limits
    }

    /// Run one submission to completion or to its first failure.
    pub async fn submit(&self, raw_text: &str) -> Result<Question, SubmitError> {
        let mut stage = SubmissionStage::Received;
        let text = validate_text(raw_text)?;
        let limits = self.settings.limits;

        let can_attempt = self
            .quota
            .try_increment_attempts(limits.max_attempts)
            .await
            .map_err(|e| upstream(stage, e))?;
        if !can_attempt {
            tracing::info!("Daily attempt limit reached");
            return Err(SubmitError::RateLimited(QuotaGate::Attempts));
        }
        stage = advance(stage, SubmissionStage::AttemptGateChecked);

        let verdict = self
            .moderator
            .moderate(text)
            .await
            .map_err(|e| upstream(stage, e))?;
        let (cleaned_text, category) = match verdict {
            ModerationResult::Accepted {
                cleaned_text,
                category,
            } => (cleaned_text, category),
            ModerationResult::Rejected { reason } => {
                tracing::info!(%reason, "Submission rejected by moderation");
                return Err(SubmitError::Rejected(reason));
            }
        };
        stage = advance(stage, SubmissionStage::Moderated);

        let can_accept = self
            .quota
            .try_increment_accepted(limits.max_accepted)
            .await
            .map_err(|e| upstream(stage, e))?;
        if !can_accept {
            tracing::info!("Daily acceptance limit reached");
            return Err(SubmitError::RateLimited(QuotaGate::Accepted));
        }
        stage = advance(stage, SubmissionStage::AcceptGateChecked);

        let used_ids = self.repo.used_image_ids().await.map_err(|e| upstream(stage, e))?;
        let image = self
            .sourcer
            .fetch_image(&used_ids, self.settings.image_max_retries)
            .await
            .map_err(|e| upstream(stage, e))?;
        stage = advance(stage, SubmissionStage::Illustrated);

        let path = new_image_path(self.clock.now_millis(), &image.content_type);
        let image_url = self
            .store
            .put_public(&path, &image.bytes, &image.content_type)
            .await
            .map_err(|e| upstream(stage, e))?;

        let new_question = NewQuestion {
            text: cleaned_text,
            category,
            image_url,
            source_image_id: image.source_id,
            created_at: self.clock.now_millis(),
        };
        let question = match self.repo.create_question(&new_question).await {
            Ok(question) => question,
            Err(err) => {
                tracing::warn!(%path, "Question insert failed; stored image is orphaned");
                return Err(upstream(stage, err));
            }
        };
        advance(stage, SubmissionStage::Persisted);

        tracing::info!(
            id = %question.id,
            category = %question.category,
            image_id = %question.source_image_id,
            "Question published"
        );
        Ok(question)
    }
}

fn advance(from: SubmissionStage, to: SubmissionStage) -> SubmissionStage {
    tracing::debug!(?from, ?to, "Submission advanced");
    to
}
