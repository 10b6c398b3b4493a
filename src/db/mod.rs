//! Database module for SQLite persistence.
//!
//! SQLite is the source of truth for questions, the used-image index and the
//! daily quota record.

mod repository;

pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS questions (
            id TEXT PRIMARY KEY,
            text TEXT NOT NULL,
            category TEXT NOT NULL,
            image_url TEXT NOT NULL,
            source_image_id TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // One row per external image ever published. Rows outlive the questions
    // that introduced them.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS used_images (
            source_image_id TEXT PRIMARY KEY,
            first_used_at INTEGER NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS daily_quota (
            id TEXT PRIMARY KEY,
            date TEXT NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0,
            accepted INTEGER NOT NULL DEFAULT 0
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_questions_created_at ON questions(created_at);
        CREATE INDEX IF NOT EXISTS idx_questions_category_created_at ON questions(category, created_at);
        CREATE INDEX IF NOT EXISTS idx_questions_source_image_id ON questions(source_image_id);
        "#,
    )
    .execute(pool)
    .await?;

    // Backfill the index for questions written before it existed.
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO used_images (source_image_id, first_used_at)
        SELECT source_image_id, MIN(created_at) FROM questions
        WHERE source_image_id <> ''
        GROUP BY source_image_id;
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
