//! Illustration sourcer.
//!
//! Draws random candidate images from a stock-photo service until one whose
//! identifier has never been published turns up, then downloads it. There is
//! no fallback image: running out of draws fails the caller.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use thiserror::Error;

/// Content type assumed when the image host does not send one.
const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug, Error)]
pub enum IllustrationError {
    #[error("image service is not configured")]
    NotConfigured,
    #[error("image request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("image service returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("image service response had no id or url")]
    MissingFields,
    #[error("could not find an unused image after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

/// One random draw from the image service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCandidate {
    pub id: String,
    pub download_url: String,
}

/// Raw bytes of a downloaded candidate.
#[derive(Debug, Clone)]
pub struct DownloadedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// An image that is safe to publish.
#[derive(Debug, Clone)]
pub struct SourcedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub source_id: String,
}

#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn random_candidate(&self) -> Result<ImageCandidate, IllustrationError>;
    async fn download(&self, candidate: &ImageCandidate)
        -> Result<DownloadedImage, IllustrationError>;
}

#[derive(Clone)]
pub struct IllustrationSourcer {
    source: Arc<dyn ImageSource>,
}

impl IllustrationSourcer {
    pub fn new(source: Arc<dyn ImageSource>) -> Self {
        Self { source }
    }

    /// Draw up to `max_retries` candidates, skipping any id in `used_ids`.
    pub async fn fetch_image(
        &self,
        used_ids: &HashSet<String>,
        max_retries: u32,
    ) -> Result<SourcedImage, IllustrationError> {
        for attempt in 1..=max_retries {
            let candidate = self.source.random_candidate().await?;

            if used_ids.contains(&candidate.id) {
                tracing::info!(
                    image_id = %candidate.id,
                    attempt,
                    max_retries,
                    "Duplicate image drawn, retrying"
                );
                continue;
            }

            let image = self.source.download(&candidate).await?;
            return Ok(SourcedImage {
                bytes: image.bytes,
                content_type: image.content_type,
                source_id: candidate.id,
            });
        }

        Err(IllustrationError::Exhausted {
            attempts: max_retries,
        })
    }
}

#[derive(Debug, Deserialize)]
struct UnsplashPhoto {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    urls: Option<UnsplashUrls>,
}

#[derive(Debug, Deserialize)]
struct UnsplashUrls {
    #[serde(default)]
    regular: Option<String>,
}

/// Random squarish photos from curated Unsplash collections.
pub struct UnsplashSource {
    http: reqwest::Client,
    access_key: Option<String>,
    collections: String,
    api_base: String,
}

impl UnsplashSource {
    pub fn new(
        http: reqwest::Client,
        access_key: Option<String>,
        collections: impl Into<String>,
    ) -> Self {
        Self {
            http,
            access_key,
            collections: collections.into(),
            api_base: "https://api.unsplash.com".to_string(),
        }
    }

    /// Point the client at another API host, e.g. a proxy.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl ImageSource for UnsplashSource {
    async fn random_candidate(&self) -> Result<ImageCandidate, IllustrationError> {
        let access_key = self
            .access_key
            .as_deref()
            .ok_or(IllustrationError::NotConfigured)?;

        let response = self
            .http
            .get(format!("{}/photos/random", self.api_base))
            .query(&[
                ("collections", self.collections.as_str()),
                ("orientation", "squarish"),
            ])
            .header(AUTHORIZATION, format!("Client-ID {}", access_key))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%status, "Unsplash returned an error status");
            return Err(IllustrationError::Status(status));
        }

        let photo: UnsplashPhoto = response.json().await?;
        match (photo.id, photo.urls.and_then(|u| u.regular)) {
            (Some(id), Some(download_url)) if !id.is_empty() && !download_url.is_empty() => {
                Ok(ImageCandidate { id, download_url })
            }
            _ => Err(IllustrationError::MissingFields),
        }
    }

    async fn download(
        &self,
        candidate: &ImageCandidate,
    ) -> Result<DownloadedImage, IllustrationError> {
        let response = self.http.get(&candidate.download_url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IllustrationError::Status(status));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| v.starts_with("image/"))
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        let bytes = response.bytes().await?.to_vec();

        Ok(DownloadedImage {
            bytes,
            content_type,
        })
    }
}

#[cfg(test)]
pub mod testing {
    //! Deterministic image source for tests.

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;

    /// Hands out ids from a script, cycling when it runs out.
    pub struct ScriptedSource {
        ids: Vec<String>,
        draws: AtomicUsize,
        downloads: Mutex<Vec<String>>,
    }

    impl ScriptedSource {
        pub fn new<I, S>(ids: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                ids: ids.into_iter().map(Into::into).collect(),
                draws: AtomicUsize::new(0),
                downloads: Mutex::new(Vec::new()),
            }
        }

        pub fn draws(&self) -> usize {
            self.draws.load(Ordering::SeqCst)
        }

        pub fn downloads(&self) -> Vec<String> {
            self.downloads.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ImageSource for ScriptedSource {
        async fn random_candidate(&self) -> Result<ImageCandidate, IllustrationError> {
            let n = self.draws.fetch_add(1, Ordering::SeqCst);
            let id = self.ids[n % self.ids.len()].clone();
            Ok(ImageCandidate {
                download_url: format!("https://images.test/{}", id),
                id,
            })
        }

        async fn download(
            &self,
            candidate: &ImageCandidate,
        ) -> Result<DownloadedImage, IllustrationError> {
            self.downloads.lock().unwrap().push(candidate.id.clone());
            Ok(DownloadedImage {
                bytes: candidate.id.as_bytes().to_vec(),
                content_type: "image/jpeg".to_string(),
            })
        }
    }
}
