use std::path::PathBuf;

use anyhow::Result;
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

/// URL prefix under which the upload directory is served.
pub const UPLOADS_PREFIX: &str = "/uploads/";

/// An image written to the upload directory.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub original_name: String,
    pub content_type: &'static str,
    pub path: PathBuf,
    /// Public path, `/uploads/<file>`.
    pub url: String,
}

/// Flat on-disk image store. Every file gets a random name so user supplied
/// names never reach the filesystem.
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Upload directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub async fn save(&self, original_name: &str, content_type: &'static str, data: &[u8]) -> Result<StoredFile> {
        let file_name = format!("{}.{}", Uuid::new_v4(), extension_for(content_type));
        let path = self.dir.join(&file_name);
        fs::write(&path, data).await?;
        Ok(StoredFile {
            original_name: original_name.to_string(),
            content_type,
            path,
            url: format!("{}{}", UPLOADS_PREFIX, file_name),
        })
    }

    /// Resolves a `/uploads/<file>` URL to its path. Remote URLs and anything
    /// trying to leave the upload directory yield `None`.
    pub fn path_for_url(&self, url: &str) -> Option<PathBuf> {
        let name = url.strip_prefix(UPLOADS_PREFIX)?;
        if name.is_empty() || name.contains("..") || name.contains('/') || name.contains('\\') {
            return None;
        }
        Some(self.dir.join(name))
    }

    /// Reads a local upload back, together with a content type guessed from
    /// its extension.
    pub async fn read(&self, url: &str) -> Option<(Vec<u8>, &'static str)> {
        let path = self.path_for_url(url)?;
        let data = fs::read(&path).await.ok()?;
        let content_type = if url.ends_with(".png") { "image/png" } else { "image/jpeg" };
        Some((data, content_type))
    }

    /// Best effort removal of a local upload. Remote URLs are ignored.
    pub async fn remove_url(&self, url: &str) {
        if let Some(path) = self.path_for_url(url) {
            self.remove_path(&path).await;
        }
    }

    pub async fn remove_path(&self, path: &PathBuf) {
        if let Err(e) = fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove upload {}: {}", path.display(), e);
            }
        }
    }

    pub async fn remove_all(&self, files: &[StoredFile]) {
        for file in files {
            self.remove_path(&file.path).await;
        }
    }
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        _ => "jpg",
    }
}

/// Sniffs the accepted image formats from their magic bytes.
pub fn detect_image_type(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("unylost-storage-{}", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_save_read_remove() {
        let storage = Storage::new(temp_dir()).await.unwrap();
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A];
        let stored = storage.save("photo.png", "image/png", &png).await.unwrap();

        assert!(stored.url.starts_with("/uploads/"));
        assert!(stored.url.ends_with(".png"));
        assert!(stored.path.exists());

        let (data, ct) = storage.read(&stored.url).await.unwrap();
        assert_eq!(data, png);
        assert_eq!(ct, "image/png");

        storage.remove_url(&stored.url).await;
        assert!(!stored.path.exists());
        // removing twice is silent
        storage.remove_url(&stored.url).await;
    }

    #[tokio::test]
    async fn test_path_for_url_rejects_escapes() {
        let storage = Storage::new(temp_dir()).await.unwrap();
        assert!(storage.path_for_url("/uploads/a.jpg").is_some());
        assert!(storage.path_for_url("/uploads/../secret").is_none());
        assert!(storage.path_for_url("/uploads/sub/a.jpg").is_none());
        assert!(storage.path_for_url("https://cdn.example/a.jpg").is_none());
        assert!(storage.path_for_url("/uploads/").is_none());
    }

    #[test]
    fn test_detect_image_type() {
        assert_eq!(detect_image_type(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(detect_image_type(&[0x89, 0x50, 0x4E, 0x47]), Some("image/png"));
        assert_eq!(detect_image_type(b"GIF89a"), None);
        assert_eq!(detect_image_type(&[]), None);
    }
}
