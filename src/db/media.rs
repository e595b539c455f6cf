/// Media attachment records
use crate::db::{parse_timestamp, text_enum};
use crate::error::MarketResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

text_enum! {
    MediaType, "media type" {
        Image => "image",
        Video => "video",
        Document => "document",
    }
}

text_enum! {
    MediaCategory, "media category" {
        Screenshot => "screenshot",
        DemoVideo => "demo_video",
        Tutorial => "tutorial",
        FeatureHighlight => "feature_highlight",
        Logo => "logo",
        Banner => "banner",
    }
}

text_enum! {
    MediaStatus, "media status" {
        Active => "active",
        Archived => "archived",
        Processing => "processing",
    }
}

impl MediaType {
    /// Infer the media type from a MIME content type
    pub fn from_content_type(content_type: &str) -> Self {
        if content_type.starts_with("image/") {
            MediaType::Image
        } else if content_type.starts_with("video/") {
            MediaType::Video
        } else {
            MediaType::Document
        }
    }

    /// Category assigned to files attached during tool submission
    pub fn default_category(&self) -> MediaCategory {
        match self {
            MediaType::Image => MediaCategory::Screenshot,
            MediaType::Video => MediaCategory::DemoVideo,
            MediaType::Document => MediaCategory::Tutorial,
        }
    }
}

pub const MEDIA_COLUMNS: &str = "id, tool_id, uploaded_by, media_type, category, url, public_id, \
     thumbnail, title, description, sort_order, file_size, width, height, duration, status, \
     created_at, updated_at";

/// Media record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub id: String,
    pub tool_id: String,
    pub uploaded_by: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub category: MediaCategory,
    pub url: String,
    pub public_id: String,
    pub thumbnail: Option<String>,
    pub title: String,
    pub description: String,
    pub order: i64,
    pub file_size: i64,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub duration: Option<f64>,
    pub status: MediaStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Media {
    pub fn from_row(row: &SqliteRow) -> MarketResult<Self> {
        Ok(Media {
            id: row.get("id"),
            tool_id: row.get("tool_id"),
            uploaded_by: row.get("uploaded_by"),
            media_type: MediaType::parse(&row.get::<String, _>("media_type"))?,
            category: MediaCategory::parse(&row.get::<String, _>("category"))?,
            url: row.get("url"),
            public_id: row.get("public_id"),
            thumbnail: row.get("thumbnail"),
            title: row.get("title"),
            description: row.get("description"),
            order: row.get("sort_order"),
            file_size: row.get("file_size"),
            width: row.get("width"),
            height: row.get("height"),
            duration: row.get("duration"),
            status: MediaStatus::parse(&row.get::<String, _>("status"))?,
            created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
            updated_at: parse_timestamp(&row.get::<String, _>("updated_at"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_from_content_type() {
        assert_eq!(MediaType::from_content_type("image/png"), MediaType::Image);
        assert_eq!(MediaType::from_content_type("video/mp4"), MediaType::Video);
        assert_eq!(
            MediaType::from_content_type("application/pdf"),
            MediaType::Document
        );
        assert_eq!(MediaType::Video.default_category(), MediaCategory::DemoVideo);
    }

    #[test]
    fn test_category_wire_names() {
        assert_eq!(MediaCategory::parse("demo_video").unwrap(), MediaCategory::DemoVideo);
        assert!(MediaCategory::parse("poster").is_err());
    }
}
