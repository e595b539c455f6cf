/// Media Storage System
///
/// Stores uploaded logos, screenshots, videos and documents and hands back
/// a retrievable URL plus derived metadata. Backends implement
/// [`MediaStorage`]; the disk backend serves files under `/uploads`.

pub mod disk;

pub use disk::DiskMediaStorage;

use crate::db::media::MediaType;
use crate::error::MarketResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of storing one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMedia {
    pub url: String,
    /// Backend handle used to delete the object later
    pub public_id: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Seconds, for videos whose duration the backend can determine
    pub duration: Option<f64>,
    pub thumbnail_url: Option<String>,
    pub size: u64,
}

/// Media storage backend trait
#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Store a file under a folder and return where it can be fetched
    async fn store(&self, data: Vec<u8>, content_type: &str, folder: &str)
        -> MarketResult<StoredMedia>;

    /// Delete a stored object and any derived files
    async fn delete(&self, public_id: &str, media_type: MediaType) -> MarketResult<()>;
}

/// File extension for a content type
pub fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/quicktime" => "mov",
        "application/pdf" => "pdf",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("video/mp4"), "mp4");
        assert_eq!(extension_for("application/zip"), "bin");
    }
}
