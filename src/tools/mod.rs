/// Tool catalogue: submission, edits, listings, search and ratings

mod manager;

pub use manager::ToolManager;

use crate::db::tool::Visual;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Maximum tools in the featured list
pub const FEATURED_LIMIT: i64 = 10;

/// Maximum results for search suggestions
pub const SUGGESTION_LIMIT: i64 = 8;

/// Maximum results for a keyword search
pub const SEARCH_LIMIT: i64 = 100;

/// A tool submission
#[derive(Debug, Clone, Default, Validate)]
pub struct NewTool {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 200, message = "Tagline is required"))]
    pub tagline: String,
    #[validate(length(min = 1, max = 5000, message = "Description is required"))]
    pub description: String,
    #[validate(url(message = "Website URL must be a valid URL"))]
    pub website_url: String,
    #[validate(url)]
    pub app_store_url: Option<String>,
    #[validate(url)]
    pub play_store_url: Option<String>,
    #[validate(length(max = 20, message = "At most 20 tags"))]
    pub tags: Vec<String>,
    pub visual: Option<Visual>,
    pub logo_url: String,
}

/// Owner edit; absent fields keep their stored value
#[derive(Debug, Clone, Default, Validate)]
pub struct ToolUpdate {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub tagline: Option<String>,
    #[validate(length(min = 1, max = 5000))]
    pub description: Option<String>,
    #[validate(url)]
    pub website_url: Option<String>,
    #[validate(url)]
    pub app_store_url: Option<String>,
    #[validate(url)]
    pub play_store_url: Option<String>,
    #[validate(length(max = 20))]
    pub tags: Option<Vec<String>>,
    pub visual: Option<Visual>,
    pub logo_url: Option<String>,
}

/// Admin decision on a tool
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolModeration {
    pub status: Option<String>,
    pub is_featured: Option<bool>,
}

/// Rating submitted by a user
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RateRequest {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i64,
}

/// Tool rating state after a user rated it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingOutcome {
    pub average_rating: f64,
    pub number_of_ratings: i64,
    pub total_rating_sum: i64,
    pub user_rating: i64,
}

/// Search suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: String,
    pub name: String,
    pub slug: String,
}

/// Split a comma-separated tag field, dropping blanks
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Parse a submitted visual block; unparsable input is ignored
pub fn parse_visual(raw: &str) -> Option<Visual> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "undefined" || raw == "null" {
        return None;
    }

    match serde_json::from_str::<Visual>(raw) {
        Ok(visual) => Some(visual.normalized()),
        Err(e) => {
            tracing::debug!("Ignoring malformed visual block: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tags() {
        assert_eq!(parse_tags(" ai, writing ,,seo "), vec!["ai", "writing", "seo"]);
        assert!(parse_tags("").is_empty());
    }

    #[test]
    fn test_parse_visual() {
        assert!(parse_visual("undefined").is_none());
        assert!(parse_visual("{not json").is_none());

        let visual = parse_visual(
            r#"{"type":"features","color":"blue","content":[{"icon":"x","text":""},{"icon":"y","text":"Fast"}]}"#,
        )
        .unwrap();
        assert_eq!(visual.content.len(), 1);
    }
}
