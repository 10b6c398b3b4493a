//! Maintenance operations run from the command line.
//!
//! These work on the whole question collection at once and are not part of
//! the request path.

mod seed;

pub use seed::*;

use std::collections::BTreeMap;

use crate::db::Repository;
use crate::errors::AppError;
use crate::models::Question;

/// Marker found in the URL of the stock placeholder photo older records used.
pub const PLACEHOLDER_URL_MARKER: &str = "photo-1518837695005";
/// Prefix of image ids assigned by the removed fallback-image behaviour.
pub const FALLBACK_ID_PREFIX: &str = "fallback-";

/// Questions sharing one external image; the oldest is kept.
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    pub source_image_id: String,
    pub keep: Question,
    pub remove: Vec<Question>,
}

/// Group questions by external image id and keep the oldest of each group.
pub fn find_duplicate_images(questions: &[Question]) -> Vec<DuplicateGroup> {
    let mut by_image: BTreeMap<&str, Vec<&Question>> = BTreeMap::new();
    for question in questions {
        if question.source_image_id.is_empty() {
            continue;
        }
        by_image
            .entry(question.source_image_id.as_str())
            .or_default()
            .push(question);
    }

    by_image
        .into_iter()
        .filter(|(_, group)| group.len() > 1)
        .filter_map(|(source_image_id, mut group)| {
            // Stable sort: equal timestamps keep collection order.
            group.sort_by_key(|q| q.created_at);
            let mut group = group.into_iter().cloned();
            let keep = group.next()?;
            Some(DuplicateGroup {
                source_image_id: source_image_id.to_string(),
                keep,
                remove: group.collect(),
            })
        })
        .collect()
}

/// Whether a question carries a placeholder, fallback or missing image.
pub fn is_placeholder(question: &Question) -> bool {
    question.image_url.trim().is_empty()
        || question.image_url.contains(PLACEHOLDER_URL_MARKER)
        || question.source_image_id.starts_with(FALLBACK_ID_PREFIX)
}

/// Outcome of a bulk deletion.
#[derive(Debug, Clone, Default)]
pub struct DeletionReport {
    /// Questions that matched the selection
    pub matched: Vec<Question>,
    /// How many were actually deleted (zero on a dry run)
    pub deleted: usize,
}

async fn delete_all(
    repo: &Repository,
    matched: Vec<Question>,
    dry_run: bool,
) -> Result<DeletionReport, AppError> {
    let mut deleted = 0;
    if !dry_run {
        for question in &matched {
            match repo.delete_question(&question.id).await {
                Ok(()) => {
                    tracing::info!(id = %question.id, text = %preview(&question.text), "Deleted");
                    deleted += 1;
                }
                // Someone else removed it first.
                Err(AppError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
    }
    Ok(DeletionReport { matched, deleted })
}

/// Delete every question whose image was already used by an older question.
pub async fn prune_duplicate_images(
    repo: &Repository,
    dry_run: bool,
) -> Result<DeletionReport, AppError> {
    let questions = repo.all_questions().await?;
    let groups = find_duplicate_images(&questions);

    for group in &groups {
        tracing::info!(
            image_id = %group.source_image_id,
            keep = %group.keep.id,
            remove = group.remove.len(),
            "Duplicate image"
        );
    }

    let matched = groups.into_iter().flat_map(|g| g.remove).collect();
    delete_all(repo, matched, dry_run).await
}

/// Delete questions whose text equals one of `texts` exactly.
pub async fn delete_by_text(
    repo: &Repository,
    texts: &[String],
    dry_run: bool,
) -> Result<DeletionReport, AppError> {
    let questions = repo.all_questions().await?;
    let matched = questions
        .into_iter()
        .filter(|q| texts.iter().any(|t| t == &q.text))
        .collect();
    delete_all(repo, matched, dry_run).await
}

/// Delete questions with placeholder, fallback or missing images.
pub async fn delete_placeholders(
    repo: &Repository,
    dry_run: bool,
) -> Result<DeletionReport, AppError> {
    let questions = repo.all_questions().await?;
    let matched = questions.into_iter().filter(is_placeholder).collect();
    delete_all(repo, matched, dry_run).await
}

/// A question whose image could not be confirmed reachable.
#[derive(Debug, Clone)]
pub struct ImageIssue {
    pub question: Question,
    pub issue: String,
}

/// Issue a HEAD request for every image URL and collect the failures.
pub async fn check_images(
    http: &reqwest::Client,
    questions: &[Question],
) -> Vec<ImageIssue> {
    let mut issues = Vec::new();

    for question in questions {
        if question.image_url.trim().is_empty() {
            issues.push(ImageIssue {
                question: question.clone(),
                issue: "missing".to_string(),
            });
            continue;
        }

        let issue = match http.head(&question.image_url).send().await {
            Ok(response) if response.status().is_success() => None,
            Ok(response) => Some(format!("HTTP {}", response.status().as_u16())),
            Err(err) => {
                tracing::debug!(url = %question.image_url, error = %err, "HEAD failed");
                Some("fetch error".to_string())
            }
        };

        if let Some(issue) = issue {
            issues.push(ImageIssue {
                question: question.clone(),
                issue,
            });
        }
    }

    issues
}

/// First 50 characters of a question, for log lines.
pub fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(50).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
