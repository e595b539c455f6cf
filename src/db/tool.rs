/// Tool records and their denormalized aggregate groups
use crate::db::{parse_optional_timestamp, parse_timestamp, text_enum};
use crate::error::{MarketError, MarketResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

text_enum! {
    /// Moderation status of a tool listing
    ToolStatus, "tool status" {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

text_enum! {
    /// Where a tool or user record came from
    Source, "source" {
        Listed => "listed",
        Scraped => "scraped",
    }
}

/// Column list shared by every query that materializes a [`Tool`]
pub const TOOL_COLUMNS: &str = "t.id, t.name, t.slug, t.tagline, t.description, t.website_url, \
     t.app_store_url, t.play_store_url, t.tags, t.status, t.is_featured, t.submitted_by, \
     t.logo_url, t.visual, t.source, t.rating_sum, t.rating_count, t.rating_average, \
     t.total_views, t.unique_views, t.weekly_views, t.monthly_views, t.last_viewed_at, \
     t.total_comments, t.approved_comments, t.last_comment_at, t.total_media, \
     t.screenshot_count, t.video_count, t.created_at, t.updated_at";

/// Structured highlight block shown on a tool page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visual {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub content: Vec<VisualItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualItem {
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub text: String,
}

impl Visual {
    /// Drop items whose text is blank
    pub fn normalized(mut self) -> Self {
        self.content.retain(|item| !item.text.trim().is_empty());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingStats {
    pub total_rating_sum: i64,
    pub number_of_ratings: i64,
    pub average_rating: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewStats {
    pub total_views: i64,
    pub unique_views: i64,
    pub weekly_views: i64,
    pub monthly_views: i64,
    pub last_viewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentStats {
    pub total_comments: i64,
    pub approved_comments: i64,
    pub last_comment_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaStats {
    pub total_media: i64,
    pub screenshot_count: i64,
    pub video_count: i64,
}

/// Submitter details attached to admin tool listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submitter {
    pub id: String,
    pub company_name: String,
    pub email: String,
}

/// Tool record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub tagline: String,
    pub description: String,
    pub website_url: String,
    pub app_store_url: Option<String>,
    pub play_store_url: Option<String>,
    pub tags: Vec<String>,
    pub status: ToolStatus,
    pub is_featured: bool,
    pub submitted_by: String,
    pub logo: String,
    pub visual: Option<Visual>,
    pub source: Source,
    pub rating: RatingStats,
    pub analytics: ViewStats,
    pub comment_stats: CommentStats,
    pub media_stats: MediaStats,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub submitter: Option<Submitter>,
}

impl Tool {
    /// Build a tool from a row selected with [`TOOL_COLUMNS`]
    pub fn from_row(row: &SqliteRow) -> MarketResult<Self> {
        let tags: String = row.get("tags");
        let tags = serde_json::from_str(&tags)
            .map_err(|e| MarketError::Internal(format!("Corrupt tag list: {}", e)))?;

        let visual = row
            .get::<Option<String>, _>("visual")
            .map(|v| serde_json::from_str::<Visual>(&v))
            .transpose()
            .map_err(|e| MarketError::Internal(format!("Corrupt visual block: {}", e)))?;

        Ok(Tool {
            id: row.get("id"),
            name: row.get("name"),
            slug: row.get("slug"),
            tagline: row.get("tagline"),
            description: row.get("description"),
            website_url: row.get("website_url"),
            app_store_url: row.get("app_store_url"),
            play_store_url: row.get("play_store_url"),
            tags,
            status: ToolStatus::parse(&row.get::<String, _>("status"))?,
            is_featured: row.get("is_featured"),
            submitted_by: row.get("submitted_by"),
            logo: row.get("logo_url"),
            visual,
            source: Source::parse(&row.get::<String, _>("source"))?,
            rating: RatingStats {
                total_rating_sum: row.get("rating_sum"),
                number_of_ratings: row.get("rating_count"),
                average_rating: row.get("rating_average"),
            },
            analytics: ViewStats {
                total_views: row.get("total_views"),
                unique_views: row.get("unique_views"),
                weekly_views: row.get("weekly_views"),
                monthly_views: row.get("monthly_views"),
                last_viewed_at: parse_optional_timestamp(row.get("last_viewed_at"))?,
            },
            comment_stats: CommentStats {
                total_comments: row.get("total_comments"),
                approved_comments: row.get("approved_comments"),
                last_comment_at: parse_optional_timestamp(row.get("last_comment_at"))?,
            },
            media_stats: MediaStats {
                total_media: row.get("total_media"),
                screenshot_count: row.get("screenshot_count"),
                video_count: row.get("video_count"),
            },
            created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
            updated_at: parse_timestamp(&row.get::<String, _>("updated_at"))?,
            submitter: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visual_drops_blank_items() {
        let visual: Visual = serde_json::from_str(
            r##"{"type":"list","color":"#fff","content":[{"icon":"a","text":"Fast"},{"icon":"b","text":"  "}]}"##,
        )
        .unwrap();

        let visual = visual.normalized();
        assert_eq!(visual.kind, "list");
        assert_eq!(visual.content.len(), 1);
        assert_eq!(visual.content[0].text, "Fast");
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(ToolStatus::parse("approved").unwrap(), ToolStatus::Approved);
        assert!(ToolStatus::parse("archived").is_err());
        assert_eq!(
            serde_json::to_string(&ToolStatus::Pending).unwrap(),
            "\"pending\""
        );
    }
}
