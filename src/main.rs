//! Nice Questions Backend
//!
//! Serves a public feed of illustrated conversation questions, accepts new
//! submissions through moderation, and carries the maintenance commands for
//! the question collection.

mod api;
mod clock;
mod config;
mod db;
mod errors;
mod illustration;
mod maintenance;
mod models;
mod moderation;
mod pipeline;
mod quota;
mod storage;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use clap::{Parser, Subcommand};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use clock::{Clock, SystemClock};
use config::{Config, LogFormat};
use db::Repository;
use illustration::{IllustrationSourcer, UnsplashSource};
use moderation::OpenAiModerator;
use pipeline::{PipelineSettings, SubmissionPipeline};
use storage::LocalObjectStore;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub pipeline: Arc<SubmissionPipeline>,
}

#[derive(Parser, Debug)]
#[command(name = "nice-questions", author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Delete questions that reuse an image already shown by an older question
    PruneDuplicates {
        #[arg(long)]
        dry_run: bool,
    },
    /// Delete questions whose text matches a line of FILE exactly
    DeleteText {
        file: PathBuf,
        #[arg(long)]
        dry_run: bool,
    },
    /// Delete questions with placeholder, fallback or missing images
    DeletePlaceholders {
        #[arg(long)]
        dry_run: bool,
    },
    /// Report questions whose image URL is missing or unreachable
    CheckImages,
    /// Import questions from a file of `#` category headers and question lines
    Seed {
        file: PathBuf,
        #[arg(long, default_value_t = 40)]
        batch_size: usize,
        #[arg(long, default_value_t = 65 * 60)]
        batch_delay_secs: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;

    init_tracing(&config);

    let pool = db::init_database(&config.db_path)
        .await
        .with_context(|| format!("Failed to open database at {:?}", config.db_path))?;
    let repo = Arc::new(Repository::new(pool));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, repo).await,
        Command::PruneDuplicates { dry_run } => {
            let report = maintenance::prune_duplicate_images(&repo, dry_run).await?;
            print_deletions("duplicate-image", &report, dry_run);
            Ok(())
        }
        Command::DeleteText { file, dry_run } => {
            let content = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {:?}", file))?;
            let texts: Vec<String> = content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect();
            let report = maintenance::delete_by_text(&repo, &texts, dry_run).await?;
            print_deletions("matching", &report, dry_run);
            Ok(())
        }
        Command::DeletePlaceholders { dry_run } => {
            let report = maintenance::delete_placeholders(&repo, dry_run).await?;
            print_deletions("placeholder-image", &report, dry_run);
            Ok(())
        }
        Command::CheckImages => {
            let questions = repo.all_questions().await?;
            let issues = maintenance::check_images(&http_client()?, &questions).await;
            for issue in &issues {
                println!(
                    "{}\t{}\t{}",
                    issue.question.id,
                    issue.issue,
                    maintenance::preview(&issue.question.text)
                );
            }
            println!(
                "{} of {} questions have image problems",
                issues.len(),
                questions.len()
            );
            Ok(())
        }
        Command::Seed {
            file,
            batch_size,
            batch_delay_secs,
        } => {
            let options = maintenance::SeedOptions {
                batch_size,
                batch_delay: Duration::from_secs(batch_delay_secs),
                ..Default::default()
            };
            seed(&config, &repo, &file, options).await
        }
    }
}

fn init_tracing(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }
}

fn http_client() -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("Failed to build HTTP client")
}

fn image_sourcer(config: &Config, http: reqwest::Client) -> IllustrationSourcer {
    if config.unsplash_access_key.is_none() {
        tracing::warn!("No Unsplash access key configured (UNSPLASH_ACCESS_KEY). Image sourcing will fail!");
    }
    IllustrationSourcer::new(Arc::new(UnsplashSource::new(
        http,
        config.unsplash_access_key.clone(),
        config.unsplash_collections.clone(),
    )))
}

async fn serve(config: Config, repo: Arc<Repository>) -> anyhow::Result<()> {
    tracing::info!("Starting Nice Questions Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Storage directory: {:?}", config.storage_dir);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.openai_api_key.is_none() {
        tracing::warn!("No moderation API key configured (OPENAI_API_KEY). Submissions will fail!");
    }

    let http = http_client()?;
    let store = LocalObjectStore::new(&config.storage_dir, &config.public_base_url);
    let images_dir = store.images_dir();
    tokio::fs::create_dir_all(&images_dir)
        .await
        .with_context(|| format!("Failed to create {:?}", images_dir))?;

    let moderator = OpenAiModerator::new(
        http.clone(),
        config.openai_api_key.clone(),
        &config.openai_base_url,
        &config.openai_model,
    );
    let pipeline = SubmissionPipeline::new(
        repo.clone(),
        Arc::new(moderator),
        image_sourcer(&config, http),
        Arc::new(store),
        Arc::new(SystemClock),
        PipelineSettings {
            limits: config.limits,
            image_max_retries: config.image_max_retries,
        },
    );

    // Create application state
    let state = AppState {
        repo,
        pipeline: Arc::new(pipeline),
    };

    let app = create_router(state, &images_dir);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn seed(
    config: &Config,
    repo: &Repository,
    file: &Path,
    options: maintenance::SeedOptions,
) -> anyhow::Result<()> {
    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {:?}", file))?;
    let parsed = maintenance::parse_seed_file(&content);

    for line in &parsed.skipped {
        println!("skipped line {}: {}", line.line_number, line.text);
    }
    println!(
        "{} questions to seed ({} duplicates, {} skipped lines)",
        parsed.questions.len(),
        parsed.duplicates,
        parsed.skipped.len()
    );

    let sourcer = image_sourcer(config, http_client()?);
    let store = LocalObjectStore::new(&config.storage_dir, &config.public_base_url);
    let clock = SystemClock;
    let seeder = maintenance::Seeder {
        repo,
        sourcer: &sourcer,
        store: &store,
        clock: &clock as &dyn Clock,
    };

    let report = seeder.run(&parsed.questions, options).await?;

    for (text, error) in &report.failed {
        println!("failed: {} ({})", maintenance::preview(text), error);
    }
    println!("Added {} questions, {} failed", report.added, report.failed.len());
    Ok(())
}

fn print_deletions(kind: &str, report: &maintenance::DeletionReport, dry_run: bool) {
    for question in &report.matched {
        println!(
            "{}\t{}\t{}",
            question.id,
            question.source_image_id,
            maintenance::preview(&question.text)
        );
    }
    if dry_run {
        println!("Dry run: {} {} questions would be deleted", report.matched.len(), kind);
    } else {
        println!("Deleted {} {} questions", report.deleted, kind);
    }
}

/// Create the application router with all routes.
pub fn create_router(state: AppState, images_dir: &Path) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API routes
    let api_routes = Router::new()
        .route("/questions", get(api::list_questions))
        .route("/question/{id}", get(api::get_question))
        .route("/limits", get(api::get_limits))
        .route("/submit", post(api::submit_question));

    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .nest_service("/images", ServeDir::new(images_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
