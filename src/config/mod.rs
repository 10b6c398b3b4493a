//! Configuration module for the Nice Questions backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Raised when an environment variable is present but cannot be parsed.
#[derive(Debug, Error)]
#[error("invalid value {value:?} for {key}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
}

/// Output format for the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Daily caps enforced by the quota store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaLimits {
    pub max_attempts: u32,
    pub max_accepted: u32,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Directory that uploaded images are written to
    pub storage_dir: PathBuf,
    /// Base URL under which `/images/...` is publicly reachable
    pub public_base_url: String,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,
    /// API key for the chat-completions endpoint
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    /// Unsplash access key (`Client-ID`)
    pub unsplash_access_key: Option<String>,
    /// Comma-separated curated collection ids
    pub unsplash_collections: String,
    pub limits: QuotaLimits,
    /// Random draws allowed per submission before giving up on a unique image
    pub image_max_retries: u32,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let db_path = env_or("NQ_DB_PATH", "./data/app.sqlite").into();
        let storage_dir = env_or("NQ_STORAGE_DIR", "./data/storage").into();
        let public_base_url = env_or("NQ_PUBLIC_BASE_URL", "http://127.0.0.1:8080")
            .trim_end_matches('/')
            .to_string();
        let bind_addr = parse_env("NQ_BIND_ADDR", "127.0.0.1:8080")?;
        let log_level = env_or("NQ_LOG_LEVEL", "info");

        let log_format = match env_or("NQ_LOG_FORMAT", "text").to_lowercase().as_str() {
            "text" => LogFormat::Text,
            "json" => LogFormat::Json,
            other => {
                return Err(ConfigError {
                    key: "NQ_LOG_FORMAT",
                    value: other.to_string(),
                })
            }
        };

        let openai_api_key = non_empty_env("OPENAI_API_KEY");
        let openai_base_url = env_or("NQ_OPENAI_BASE_URL", "https://api.openai.com/v1")
            .trim_end_matches('/')
            .to_string();
        let openai_model = env_or("NQ_OPENAI_MODEL", "gpt-4o-mini");

        let unsplash_access_key = non_empty_env("UNSPLASH_ACCESS_KEY");
        let unsplash_collections = env_or("NQ_UNSPLASH_COLLECTIONS", "ViZ7rtrjAgY,1319040");

        let limits = QuotaLimits {
            max_attempts: parse_env("NQ_MAX_DAILY_ATTEMPTS", "100")?,
            max_accepted: parse_env("NQ_MAX_DAILY_ACCEPTED", "50")?,
        };
        let image_max_retries = parse_env("NQ_IMAGE_MAX_RETRIES", "5")?;

        Ok(Self {
            db_path,
            storage_dir,
            public_base_url,
            bind_addr,
            log_level,
            log_format,
            openai_api_key,
            openai_base_url,
            openai_model,
            unsplash_access_key,
            unsplash_collections,
            limits,
            image_max_retries,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError> {
    let value = env_or(key, default);
    value.trim().parse().map_err(|_| ConfigError { key, value })
}
