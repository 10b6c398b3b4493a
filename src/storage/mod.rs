//! Object storage for published images.
//!
//! Objects are written once under a unique path and are publicly readable
//! afterwards. The local implementation keeps them on disk and the router
//! serves them from `/images`.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid object path {0:?}")]
    InvalidPath(String),
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` at `path`, make it public and return its public URL.
    async fn put_public(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, StorageError>;
}

/// File extension for an image content type.
pub fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/avif" => "avif",
        _ => "jpg",
    }
}

/// A fresh, unique object path such as `images/1760875200000-3f9a2c1b.jpg`.
pub fn new_image_path(now_millis: i64, content_type: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "images/{}-{}.{}",
        now_millis,
        &suffix[..8],
        extension_for(content_type)
    )
}

/// Filesystem-backed store; `public_base_url` must point at the router.
pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Directory served under `/images`.
    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        let safe = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put_public(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, StorageError> {
        let target = self.resolve(path)?;
        let write_err = |source: std::io::Error| StorageError::Write {
            path: path.to_string(),
            source,
        };

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        tokio::fs::write(&target, bytes).await.map_err(write_err)?;

        tracing::debug!(path, content_type, size = bytes.len(), "Stored image");

        Ok(format!("{}/{}", self.public_base_url, path))
    }
}
