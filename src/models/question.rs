//! Question model matching the frontend Question interface.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Fixed set of gallery categories.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    ForCrossroads,
    ForLovedOnes,
    MakingFriends,
    BigQuestions,
    ForAGathering,
    MeetYourself,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::ForCrossroads,
        Category::ForLovedOnes,
        Category::MakingFriends,
        Category::BigQuestions,
        Category::ForAGathering,
        Category::MeetYourself,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::ForCrossroads => "for-crossroads",
            Category::ForLovedOnes => "for-loved-ones",
            Category::MakingFriends => "making-friends",
            Category::BigQuestions => "big-questions",
            Category::ForAGathering => "for-a-gathering",
            Category::MeetYourself => "meet-yourself",
        }
    }

    /// Parse a kebab-case tag such as `big-questions`.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }

    /// Parse a human header such as `Big Questions` (seed files) or a tag.
    pub fn from_header(header: &str) -> Option<Self> {
        let slug = header
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-")
            .to_lowercase();
        Self::parse(&slug)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A published question card.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub text: String,
    pub category: Category,
    pub image_url: String,
    /// Identifier of the external image, used for dedup
    pub source_image_id: String,
    /// Milliseconds since the Unix epoch
    pub created_at: i64,
}

/// Everything needed to insert a question; the id is assigned by the repository.
#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub text: String,
    pub category: Category,
    pub image_url: String,
    pub source_image_id: String,
    pub created_at: i64,
}

/// Request body for `POST /api/submit`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub text: Option<String>,
}
