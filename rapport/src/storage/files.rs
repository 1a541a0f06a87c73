//! Attachment file storage
//!
//! Binary attachment content lives outside the synced collections; records
//! keep only the storage path and download URL. `FileStorage` is the narrow
//! interface the attachments service needs from a storage backend.
//!
//! `LocalFileStorage` keeps files under a root directory, mirroring the
//! storage path: "users/u1/attachments/notes/n1/a1_cv.pdf" is stored at
//! "<root>/users/u1/attachments/notes/n1/a1_cv.pdf".

use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use url::Url;

#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Store `data` at `path`, returning a download URL
    async fn put(&self, path: &str, mime_type: &str, data: &[u8]) -> Result<String>;

    /// Delete the object at `path`; deleting a missing object is not an error
    async fn delete(&self, path: &str) -> Result<()>;
}

/// Directory-backed file storage
#[derive(Clone, Debug)]
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    /// Open file storage at `root`, creating the directory if needed
    pub async fn open(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root).await?;
        let root = fs::canonicalize(&root).await?;
        tracing::info!("File storage initialized at: {:?}", root);
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a storage path, rejecting anything that leaves the root
    fn get_path(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));

        if path.is_empty() || escapes {
            return Err(AppError::Storage(format!("Invalid storage path: {}", path)));
        }

        Ok(self.root.join(relative))
    }

    pub async fn exists(&self, path: &str) -> Result<bool> {
        Ok(fs::try_exists(self.get_path(path)?).await?)
    }

    pub async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.get_path(path)?;
        if !full.exists() {
            return Err(AppError::Storage(format!("File not found: {}", path)));
        }
        Ok(fs::read(full).await?)
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn put(&self, path: &str, mime_type: &str, data: &[u8]) -> Result<String> {
        let full = self.get_path(path)?;

        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write to temp file first (atomic write)
        let temp_path = full.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        fs::rename(temp_path, &full).await?;

        tracing::debug!("Stored file: {} ({}, {} bytes)", path, mime_type, data.len());

        Url::from_file_path(&full)
            .map(|url| url.to_string())
            .map_err(|_| AppError::Storage(format!("No file URL for {:?}", full)))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full = self.get_path(path)?;

        if !full.exists() {
            return Ok(()); // Already deleted
        }

        fs::remove_file(&full).await?;

        tracing::debug!("Deleted file: {}", path);

        Ok(())
    }
}
