//! Database repository for questions, the used-image index and the quota record.
//!
//! Uses prepared statements and transactions for data integrity.

use std::collections::HashSet;

use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::models::{Category, DailyQuota, NewQuestion, QuotaCounter, Question};

/// Fixed key of the singleton quota record.
pub const QUOTA_RECORD_ID: &str = "dailyLimits";

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== QUESTION OPERATIONS ====================

    /// List the newest questions, optionally restricted to one category.
    pub async fn list_questions(
        &self,
        category: Option<Category>,
        limit: i64,
    ) -> Result<Vec<Question>, AppError> {
        let rows = match category {
            Some(category) => {
                sqlx::query(
                    "SELECT id, text, category, image_url, source_image_id, created_at FROM questions WHERE category = ? ORDER BY created_at DESC, rowid DESC LIMIT ?",
                )
                .bind(category.as_str())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, text, category, image_url, source_image_id, created_at FROM questions ORDER BY created_at DESC, rowid DESC LIMIT ?",
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(question_from_row).collect()
    }

    /// Every question, oldest first. Used by maintenance tooling.
    pub async fn all_questions(&self) -> Result<Vec<Question>, AppError> {
        let rows = sqlx::query(
            "SELECT id, text, category, image_url, source_image_id, created_at FROM questions ORDER BY created_at ASC, rowid ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(question_from_row).collect()
    }

    /// Get a question by ID.
    pub async fn get_question(&self, id: &str) -> Result<Option<Question>, AppError> {
        let row = sqlx::query(
            "SELECT id, text, category, image_url, source_image_id, created_at FROM questions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(question_from_row).transpose()
    }

    /// Insert a question and record its image in the used-image index.
    ///
    /// Both writes share one transaction; an image id that is already in the
    /// index fails the insert.
    pub async fn create_question(&self, new: &NewQuestion) -> Result<Question, AppError> {
        let id = uuid::Uuid::new_v4().to_string();

        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO used_images (source_image_id, first_used_at) VALUES (?, ?)")
            .bind(&new.source_image_id)
            .bind(new.created_at)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO questions (id, text, category, image_url, source_image_id, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&new.text)
        .bind(new.category.as_str())
        .bind(&new.image_url)
        .bind(&new.source_image_id)
        .bind(new.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Question {
            id,
            text: new.text.clone(),
            category: new.category,
            image_url: new.image_url.clone(),
            source_image_id: new.source_image_id.clone(),
            created_at: new.created_at,
        })
    }

    /// Delete a question. Its image id stays in the used-image index.
    pub async fn delete_question(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM questions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Question {} not found", id)));
        }

        Ok(())
    }

    /// All external image ids that must not be published again.
    pub async fn used_image_ids(&self) -> Result<HashSet<String>, AppError> {
        let rows = sqlx::query("SELECT source_image_id FROM used_images")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| row.get::<String, _>("source_image_id"))
            .collect())
    }

    // ==================== QUOTA OPERATIONS ====================

    /// Load the stored quota record exactly as persisted (no day rollover applied).
    pub async fn load_quota(&self) -> Result<Option<DailyQuota>, AppError> {
        let row = sqlx::query("SELECT date, attempts, accepted FROM daily_quota WHERE id = ?")
            .bind(QUOTA_RECORD_ID)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(quota_from_row))
    }

    /// Count one more attempt or acceptance for `today`, unless that counter
    /// has already reached `max`. Returns whether the increment happened.
    ///
    /// One conditional upsert: it creates the record on first use, resets a
    /// record left over from an earlier day and checks the cap against the
    /// row it updates, so concurrent callers serialise on SQLite's write lock
    /// instead of racing a read.
    pub async fn increment_quota(
        &self,
        counter: QuotaCounter,
        today: &str,
        max: u32,
    ) -> Result<bool, AppError> {
        let statement = match counter {
            QuotaCounter::Attempts => {
                r#"
                INSERT INTO daily_quota (id, date, attempts, accepted)
                SELECT ?, ?, 1, 0 WHERE ? > 0
                ON CONFLICT(id) DO UPDATE SET
                    attempts = CASE WHEN date = excluded.date THEN attempts + 1 ELSE 1 END,
                    accepted = CASE WHEN date = excluded.date THEN accepted ELSE 0 END,
                    date = excluded.date
                WHERE (CASE WHEN date = excluded.date THEN attempts ELSE 0 END) < ?
                "#
            }
            QuotaCounter::Accepted => {
                r#"
                INSERT INTO daily_quota (id, date, attempts, accepted)
                SELECT ?, ?, 0, 1 WHERE ? > 0
                ON CONFLICT(id) DO UPDATE SET
                    attempts = CASE WHEN date = excluded.date THEN attempts ELSE 0 END,
                    accepted = CASE WHEN date = excluded.date THEN accepted + 1 ELSE 1 END,
                    date = excluded.date
                WHERE (CASE WHEN date = excluded.date THEN accepted ELSE 0 END) < ?
                "#
            }
        };

        let result = sqlx::query(statement)
            .bind(QUOTA_RECORD_ID)
            .bind(today)
            .bind(i64::from(max))
            .bind(i64::from(max))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}

// Helper functions for row conversion

fn question_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Question, AppError> {
    let category_str: String = row.get("category");
    let category = Category::parse(&category_str).ok_or_else(|| {
        AppError::Internal(format!("Unknown category {:?} in questions table", category_str))
    })?;

    Ok(Question {
        id: row.get("id"),
        text: row.get("text"),
        category,
        image_url: row.get("image_url"),
        source_image_id: row.get("source_image_id"),
        created_at: row.get("created_at"),
    })
}

fn quota_from_row(row: &sqlx::sqlite::SqliteRow) -> DailyQuota {
    let attempts: i64 = row.get("attempts");
    let accepted: i64 = row.get("accepted");
    DailyQuota {
        date: row.get("date"),
        attempts: u32::try_from(attempts).unwrap_or(0),
        accepted: u32::try_from(accepted).unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::db::init_database;

    async fn repo() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("test.sqlite"))
            .await
            .unwrap();
        (Repository::new(pool), temp_dir)
    }

    fn new_question(text: &str, category: Category, image: &str, at: i64) -> NewQuestion {
        NewQuestion {
            text: text.to_string(),
            category,
            image_url: format!("http://localhost/images/{}.jpg", image),
            source_image_id: image.to_string(),
            created_at: at,
        }
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_filterable() {
        let (repo, _dir) = repo().await;
        repo.create_question(&new_question("One?", Category::BigQuestions, "a", 1))
            .await
            .unwrap();
        repo.create_question(&new_question("Two?", Category::MakingFriends, "b", 2))
            .await
            .unwrap();
        repo.create_question(&new_question("Three?", Category::BigQuestions, "c", 3))
            .await
            .unwrap();

        let all = repo.list_questions(None, 100).await.unwrap();
        let created: Vec<i64> = all.iter().map(|q| q.created_at).collect();
        assert_eq!(created, vec![3, 2, 1]);

        let big = repo
            .list_questions(Some(Category::BigQuestions), 100)
            .await
            .unwrap();
        assert_eq!(big.len(), 2);
        assert!(big.iter().all(|q| q.category == Category::BigQuestions));

        assert_eq!(repo.list_questions(None, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_used_image_index_survives_delete() {
        let (repo, _dir) = repo().await;
        let q = repo
            .create_question(&new_question("One?", Category::BigQuestions, "img-1", 1))
            .await
            .unwrap();
        repo.delete_question(&q.id).await.unwrap();

        let used = repo.used_image_ids().await.unwrap();
        assert!(used.contains("img-1"));
        assert!(repo.get_question(&q.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_image_insert_is_rejected() {
        let (repo, _dir) = repo().await;
        repo.create_question(&new_question("One?", Category::BigQuestions, "img-1", 1))
            .await
            .unwrap();
        let err = repo
            .create_question(&new_question("Two?", Category::BigQuestions, "img-1", 2))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
        assert_eq!(repo.all_questions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_question_is_not_found() {
        let (repo, _dir) = repo().await;
        let err = repo.delete_question("nope").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_increment_quota_creates_caps_and_rolls_over() {
        let (repo, _dir) = repo().await;

        assert!(repo
            .increment_quota(QuotaCounter::Attempts, "2026-10-19", 2)
            .await
            .unwrap());
        assert!(repo
            .increment_quota(QuotaCounter::Accepted, "2026-10-19", 5)
            .await
            .unwrap());
        assert!(repo
            .increment_quota(QuotaCounter::Attempts, "2026-10-19", 2)
            .await
            .unwrap());
        // At the cap: no write.
        assert!(!repo
            .increment_quota(QuotaCounter::Attempts, "2026-10-19", 2)
            .await
            .unwrap());
        assert_eq!(
            repo.load_quota().await.unwrap(),
            Some(DailyQuota {
                date: "2026-10-19".to_string(),
                attempts: 2,
                accepted: 1,
            })
        );

        // A new day starts both counters from zero.
        assert!(repo
            .increment_quota(QuotaCounter::Accepted, "2026-10-20", 5)
            .await
            .unwrap());
        assert_eq!(
            repo.load_quota().await.unwrap(),
            Some(DailyQuota {
                date: "2026-10-20".to_string(),
                attempts: 0,
                accepted: 1,
            })
        );
    }

    #[tokio::test]
    async fn test_zero_cap_never_writes() {
        let (repo, _dir) = repo().await;
        assert!(!repo
            .increment_quota(QuotaCounter::Attempts, "2026-10-19", 0)
            .await
            .unwrap());
        assert!(repo.load_quota().await.unwrap().is_none());
    }
}
