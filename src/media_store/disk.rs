/// Disk-based media storage backend
use crate::{
    db::media::MediaType,
    error::{MarketError, MarketResult},
    media_store::{extension_for, MediaStorage, StoredMedia},
};
use async_trait::async_trait;
use image::ImageFormat;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Longest edge of generated thumbnails, in pixels
const THUMBNAIL_SIZE: u32 = 400;

/// Disk storage backend
///
/// Stores files on the local filesystem with directory sharding based on
/// the object id prefix: {base}/{folder}/{first2chars}/{id}.{ext}
#[derive(Clone)]
pub struct DiskMediaStorage {
    base_path: PathBuf,
    public_url: String,
}

struct ImageInfo {
    width: u32,
    height: u32,
    thumbnail: Option<Vec<u8>>,
}

impl DiskMediaStorage {
    /// Create a new disk storage backend
    pub fn new(base_path: PathBuf, public_url: &str) -> Self {
        Self {
            base_path,
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    fn object_path(&self, public_id: &str) -> MarketResult<PathBuf> {
        if public_id.split('/').any(|part| part.is_empty() || part == "..") {
            return Err(MarketError::Validation(format!(
                "Invalid media id: {}",
                public_id
            )));
        }
        Ok(self.base_path.join(public_id))
    }

    fn public_url_for(&self, public_id: &str) -> String {
        format!("{}/uploads/{}", self.public_url, public_id)
    }

    fn thumbnail_id(public_id: &str) -> String {
        let stem = public_id
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(public_id);
        format!("{}_thumb.jpg", stem)
    }

    async fn write(&self, public_id: &str, data: &[u8]) -> MarketResult<()> {
        let path = self.object_path(public_id)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                MarketError::UpstreamUnavailable(format!("Failed to create media directory: {}", e))
            })?;
        }

        fs::write(&path, data).await.map_err(|e| {
            MarketError::UpstreamUnavailable(format!("Failed to write media {}: {}", public_id, e))
        })
    }

    async fn remove(&self, public_id: &str) -> MarketResult<()> {
        let path = self.object_path(public_id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MarketError::UpstreamUnavailable(format!(
                "Failed to delete media {}: {}",
                public_id, e
            ))),
        }
    }

    /// Decode an image for its dimensions and a JPEG thumbnail
    fn inspect_image(data: &[u8]) -> Option<ImageInfo> {
        let img = match image::load_from_memory(data) {
            Ok(img) => img,
            Err(e) => {
                tracing::warn!("Failed to decode uploaded image: {}", e);
                return None;
            }
        };

        let thumb = img.thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE).to_rgb8();
        let mut buf = Vec::new();
        let thumbnail = match thumb.write_to(&mut std::io::Cursor::new(&mut buf), ImageFormat::Jpeg)
        {
            Ok(_) => Some(buf),
            Err(e) => {
                tracing::warn!("Failed to encode thumbnail: {}", e);
                None
            }
        };

        Some(ImageInfo {
            width: img.width(),
            height: img.height(),
            thumbnail,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

#[async_trait]
impl MediaStorage for DiskMediaStorage {
    async fn store(
        &self,
        data: Vec<u8>,
        content_type: &str,
        folder: &str,
    ) -> MarketResult<StoredMedia> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let public_id = format!(
            "{}/{}/{}.{}",
            folder,
            &id[0..2],
            id,
            extension_for(content_type)
        );

        self.write(&public_id, &data).await?;

        let mut stored = StoredMedia {
            url: self.public_url_for(&public_id),
            public_id: public_id.clone(),
            width: None,
            height: None,
            duration: None,
            thumbnail_url: None,
            size: data.len() as u64,
        };

        if MediaType::from_content_type(content_type) == MediaType::Image
            && content_type != "image/svg+xml"
        {
            let info = tokio::task::spawn_blocking(move || Self::inspect_image(&data))
                .await
                .map_err(|e| MarketError::Internal(format!("Image task failed: {}", e)))?;

            if let Some(info) = info {
                stored.width = Some(info.width);
                stored.height = Some(info.height);

                if let Some(thumbnail) = info.thumbnail {
                    let thumb_id = Self::thumbnail_id(&public_id);
                    match self.write(&thumb_id, &thumbnail).await {
                        Ok(()) => stored.thumbnail_url = Some(self.public_url_for(&thumb_id)),
                        Err(e) => tracing::warn!("Failed to store thumbnail: {}", e),
                    }
                }
            }
        }

        Ok(stored)
    }

    async fn delete(&self, public_id: &str, media_type: MediaType) -> MarketResult<()> {
        self.remove(public_id).await?;

        if media_type == MediaType::Image {
            self.remove(&Self::thumbnail_id(public_id)).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 10, 10]));
        let mut buf = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[tokio::test]
    async fn test_store_image_with_dimensions_and_thumbnail() {
        let dir = tempdir().unwrap();
        let storage = DiskMediaStorage::new(dir.path().to_path_buf(), "http://localhost:5001/");

        let stored = storage
            .store(png_bytes(800, 600), "image/png", "tool-media")
            .await
            .unwrap();

        assert!(stored.url.starts_with("http://localhost:5001/uploads/tool-media/"));
        assert!(stored.public_id.ends_with(".png"));
        assert_eq!(stored.width, Some(800));
        assert_eq!(stored.height, Some(600));
        assert!(stored.thumbnail_url.is_some());
        assert!(dir.path().join(&stored.public_id).exists());
    }

    #[tokio::test]
    async fn test_store_document_has_no_derived_metadata() {
        let dir = tempdir().unwrap();
        let storage = DiskMediaStorage::new(dir.path().to_path_buf(), "http://localhost:5001");

        let stored = storage
            .store(b"%PDF-1.4".to_vec(), "application/pdf", "tool-media")
            .await
            .unwrap();

        assert_eq!(stored.width, None);
        assert_eq!(stored.thumbnail_url, None);
        assert_eq!(stored.size, 8);
    }

    #[tokio::test]
    async fn test_delete_removes_file_and_thumbnail() {
        let dir = tempdir().unwrap();
        let storage = DiskMediaStorage::new(dir.path().to_path_buf(), "http://localhost:5001");

        let stored = storage
            .store(png_bytes(10, 10), "image/png", "logos")
            .await
            .unwrap();
        let thumb = DiskMediaStorage::thumbnail_id(&stored.public_id);
        assert!(dir.path().join(&thumb).exists());

        storage
            .delete(&stored.public_id, MediaType::Image)
            .await
            .unwrap();
        assert!(!dir.path().join(&stored.public_id).exists());
        assert!(!dir.path().join(&thumb).exists());

        // Deleting twice is fine
        storage
            .delete(&stored.public_id, MediaType::Image)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = tempdir().unwrap();
        let storage = DiskMediaStorage::new(dir.path().to_path_buf(), "http://localhost:5001");

        assert!(storage
            .delete("../etc/passwd", MediaType::Document)
            .await
            .is_err());
    }
}
