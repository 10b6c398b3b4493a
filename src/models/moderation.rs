//! Moderation verdict returned by the classifier.

use serde::Deserialize;

use super::Category;

/// Reason used when the classifier rejects without saying why.
pub const DEFAULT_REJECTION_REASON: &str = "Question didn't meet our guidelines";

/// Outcome of moderating one submission. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModerationResult {
    Accepted {
        cleaned_text: String,
        category: Category,
    },
    Rejected {
        reason: String,
    },
}

/// Raw JSON verdict as the classifier emits it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawVerdict {
    pub accepted: bool,
    #[serde(default)]
    pub cleaned_text: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}
