//! Local file output: downloads, watermark exports and the last-upload cache

use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use glowii_core::AppResult;

const CACHE_STEM: &str = "last_upload";

/// `enhanced_image_<epoch-millis>.png`
pub fn enhanced_file_name(at: DateTime<Utc>) -> String {
    format!("enhanced_image_{}.png", at.timestamp_millis())
}

/// Write `bytes` to `dir/file_name`, creating `dir` if needed.
pub async fn write_output(dir: &Path, file_name: &str, bytes: &[u8]) -> AppResult<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(file_name);
    tokio::fs::write(&path, bytes).await?;
    tracing::info!(path = %path.display(), size = bytes.len(), "File written");
    Ok(path)
}

/// Best-effort, non-authoritative copy of the most recently uploaded file.
#[derive(Debug, Clone)]
pub struct UploadCache {
    dir: PathBuf,
}

impl UploadCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Replace the cached file. The extension follows the uploaded file name.
    pub async fn store(&self, file_name: &str, bytes: &[u8]) -> AppResult<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        self.clear().await?;

        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_else(|| "bin".to_string());
        let path = self.dir.join(format!("{}.{}", CACHE_STEM, extension));
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Cached file, if any.
    pub async fn load(&self) -> AppResult<Option<(PathBuf, Bytes)>> {
        let Some(path) = self.find().await? else {
            return Ok(None);
        };
        let bytes = tokio::fs::read(&path).await?;
        Ok(Some((path, Bytes::from(bytes))))
    }

    async fn clear(&self) -> AppResult<()> {
        while let Some(path) = self.find().await? {
            tokio::fs::remove_file(&path).await?;
        }
        Ok(())
    }

    async fn find(&self) -> AppResult<Option<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_cache = path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s == CACHE_STEM)
                .unwrap_or(false);
            if is_cache && entry.file_type().await?.is_file() {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }
}
