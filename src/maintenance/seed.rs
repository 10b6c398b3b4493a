//! Bulk seeding from a categorised text file.
//!
//! The file is a list of questions grouped under `#` headers naming a
//! category:
//!
//! ```text
//! # Big Questions
//! What would you do with an extra hour every day?
//! # Meet Yourself
//! When do you feel most like yourself?
//! ```
//!
//! Seeded questions skip moderation and the daily quota but still get a
//! unique image each.

use std::collections::HashSet;
use std::time::Duration;

use crate::clock::Clock;
use crate::db::Repository;
use crate::errors::AppError;
use crate::illustration::IllustrationSourcer;
use crate::models::{Category, NewQuestion};
use crate::storage::{new_image_path, ObjectStore};

use super::preview;

/// Spacing between the synthetic creation times of consecutive seeds.
const SEED_SPACING_MILLIS: i64 = 60_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedQuestion {
    pub text: String,
    pub category: Category,
}

/// A line the parser could not place under a known category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    pub line_number: usize,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedFile {
    pub questions: Vec<SeedQuestion>,
    pub skipped: Vec<SkippedLine>,
    /// Repeats of an earlier question, compared case-insensitively.
    pub duplicates: usize,
}

/// Parse a seed file. Blank lines are ignored.
pub fn parse_seed_file(content: &str) -> SeedFile {
    let mut file = SeedFile::default();
    let mut seen = HashSet::new();
    let mut current: Option<Category> = None;

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(header) = line.strip_prefix('#') {
            current = Category::from_header(header);
            if current.is_none() {
                tracing::warn!(line = index + 1, header = header.trim(), "Unknown category header");
            }
            continue;
        }

        let Some(category) = current else {
            file.skipped.push(SkippedLine {
                line_number: index + 1,
                text: line.to_string(),
            });
            continue;
        };

        if !seen.insert(line.to_lowercase()) {
            file.duplicates += 1;
            continue;
        }

        file.questions.push(SeedQuestion {
            text: line.to_string(),
            category,
        });
    }

    file
}

/// How a seeding run paces itself.
#[derive(Debug, Clone, Copy)]
pub struct SeedOptions {
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub image_max_retries: u32,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self {
            batch_size: 40,
            batch_delay: Duration::from_secs(65 * 60),
            image_max_retries: 10,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SeedReport {
    pub added: usize,
    pub failed: Vec<(String, String)>,
}

/// Collaborators a seeding run needs.
pub struct Seeder<'a> {
    pub repo: &'a Repository,
    pub sourcer: &'a IllustrationSourcer,
    pub store: &'a dyn ObjectStore,
    pub clock: &'a dyn Clock,
}

impl Seeder<'_> {
    /// Insert `questions` in batches, pausing between batches so the image
    /// service's hourly rate limit recovers.
    ///
    /// Creation times are staggered one minute apart with the last question
    /// at the start of the run, so the file order is preserved newest-last.
    /// A failed question is logged and skipped.
    pub async fn run(
        &self,
        questions: &[SeedQuestion],
        options: SeedOptions,
    ) -> Result<SeedReport, AppError> {
        let mut report = SeedReport::default();
        let mut used_ids = self.repo.used_image_ids().await?;
        let total = questions.len() as i64;
        let started_at = self.clock.now_millis();
        let batch_size = options.batch_size.max(1);
        let batches = questions.len().div_ceil(batch_size);

        for (batch_index, batch) in questions.chunks(batch_size).enumerate() {
            tracing::info!(
                batch = batch_index + 1,
                batches,
                size = batch.len(),
                "Seeding batch"
            );

            for (offset, seed) in batch.iter().enumerate() {
                let position = (batch_index * batch_size + offset + 1) as i64;
                let created_at = started_at - (total - position) * SEED_SPACING_MILLIS;

                match self.seed_one(seed, created_at, &used_ids, options).await {
                    Ok(source_id) => {
                        used_ids.insert(source_id);
                        report.added += 1;
                        tracing::info!(position, total, text = %preview(&seed.text), "Seeded");
                    }
                    Err(err) => {
                        tracing::warn!(text = %preview(&seed.text), error = %err, "Seeding failed");
                        report.failed.push((seed.text.clone(), err));
                    }
                }
            }

            if batch_index + 1 < batches && !options.batch_delay.is_zero() {
                tracing::info!(delay_secs = options.batch_delay.as_secs(), "Waiting before next batch");
                tokio::time::sleep(options.batch_delay).await;
            }
        }

        Ok(report)
    }

    async fn seed_one(
        &self,
        seed: &SeedQuestion,
        created_at: i64,
        used_ids: &HashSet<String>,
        options: SeedOptions,
    ) -> Result<String, String> {
        let image = self
            .sourcer
            .fetch_image(used_ids, options.image_max_retries)
            .await
            .map_err(|e| e.to_string())?;

        let path = new_image_path(self.clock.now_millis(), &image.content_type);
        let image_url = self
            .store
            .put_public(&path, &image.bytes, &image.content_type)
            .await
            .map_err(|e| e.to_string())?;

        self.repo
            .create_question(&NewQuestion {
                text: seed.text.clone(),
                category: seed.category,
                image_url,
                source_image_id: image.source_id.clone(),
                created_at,
            })
            .await
            .map_err(|e| e.to_string())?;

        Ok(image.source_id)
    }
}
