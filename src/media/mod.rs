/// Tool media attachments: screenshots, videos and documents

mod manager;

pub use manager::MediaManager;

use serde::Deserialize;
use validator::Validate;

/// Storage folder for tool media
pub const MEDIA_FOLDER: &str = "tool-media";

/// Storage folder for tool and company logos
pub const LOGO_FOLDER: &str = "logos";

/// Files accepted alongside a tool submission
pub const MAX_SUBMISSION_FILES: usize = 10;

/// A received file
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub data: Vec<u8>,
    pub content_type: String,
    pub file_name: Option<String>,
}

/// Descriptive fields sent with an upload
#[derive(Debug, Clone, Default, Validate)]
pub struct MediaUpload {
    /// Defaults to the category implied by the media type
    pub category: Option<String>,
    #[validate(length(max = 100, message = "Title is too long (max 100 characters)"))]
    pub title: Option<String>,
    #[validate(length(max = 500, message = "Description is too long (max 500 characters)"))]
    pub description: Option<String>,
    pub order: Option<i64>,
}

/// Media edit; absent fields are left alone
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct MediaUpdate {
    #[validate(length(max = 100, message = "Title is too long (max 100 characters)"))]
    pub title: Option<String>,
    #[validate(length(max = 500, message = "Description is too long (max 500 characters)"))]
    pub description: Option<String>,
    pub order: Option<i64>,
    pub category: Option<String>,
}

/// Listing filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaFilter {
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub media_type: Option<String>,
}
