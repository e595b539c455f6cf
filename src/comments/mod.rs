/// Threaded tool comments with votes, reports and moderation

mod manager;

pub use manager::CommentManager;

use crate::db::comment::{Comment, CommentAuthor, CommentEdit, CommentReport, CommentStatus, VoteType};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Maximum comment length, in characters
pub const MAX_CONTENT_CHARS: usize = 1000;

/// Maximum report description length, in characters
pub const MAX_REPORT_DESCRIPTION_CHARS: usize = 500;

/// Replies embedded under each top-level comment
pub const REPLIES_PER_COMMENT: i64 = 5;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 50;

/// Hours after creation during which the author may edit
pub const EDIT_WINDOW_HOURS: i64 = 24;

/// Content left behind when a comment with replies is deleted
pub const DELETED_PLACEHOLDER: &str = "[Comment deleted by user]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommentSort {
    #[default]
    Newest,
    Oldest,
    Popular,
}

impl CommentSort {
    /// Unknown values fall back to newest
    pub fn parse(s: Option<&str>) -> Self {
        match s {
            Some("oldest") => CommentSort::Oldest,
            Some("popular") => CommentSort::Popular,
            _ => CommentSort::Newest,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CommentSort::Newest => "newest",
            CommentSort::Oldest => "oldest",
            CommentSort::Popular => "popular",
        }
    }

    fn order_by(&self) -> &'static str {
        match self {
            CommentSort::Newest => "c.created_at DESC, c.rowid DESC",
            CommentSort::Oldest => "c.created_at ASC, c.rowid ASC",
            CommentSort::Popular => "c.upvotes DESC, c.created_at DESC, c.rowid DESC",
        }
    }
}

/// Page request for a comment thread
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CommentQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort: Option<String>,
}

impl CommentQuery {
    /// Page number, limit and sort with defaults and bounds applied
    pub fn normalized(&self) -> (u32, u32, CommentSort) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        (page, limit, CommentSort::parse(self.sort.as_deref()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub content: String,
    #[serde(default)]
    pub parent_comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditComment {
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub vote_type: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReportRequest {
    pub reason: String,
    #[serde(default)]
    #[validate(length(max = 500, message = "Description is too long (max 500 characters)"))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModerateRequest {
    pub status: String,
}

/// A comment as shown in a thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub user: CommentAuthor,
    pub user_vote: Option<VoteType>,
    pub is_reported: bool,
    pub report_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replies: Option<Vec<CommentView>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_more_replies: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_comments: i64,
    pub has_next_page: bool,
}

impl Pagination {
    pub fn new(page: u32, limit: u32, total: i64) -> Self {
        let total_pages = ((total.max(0) as u64 + limit as u64 - 1) / limit as u64) as u32;
        Self {
            current_page: page,
            total_pages,
            total_comments: total,
            has_next_page: page < total_pages,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentPage {
    pub comments: Vec<CommentView>,
    pub pagination: Pagination,
}

/// Result of a vote toggle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteOutcome {
    pub message: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_vote: Option<VoteType>,
    pub upvotes: i64,
    pub downvotes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportOutcome {
    pub message: String,
    pub status: CommentStatus,
}

/// Author details visible to admins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationAuthor {
    pub id: String,
    pub company_name: String,
    pub email: String,
    pub company_logo_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSummary {
    pub id: String,
    pub name: String,
    pub slug: String,
}

/// A comment with its reports and history, for moderation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationView {
    #[serde(flatten)]
    pub comment: Comment,
    pub user: ModerationAuthor,
    pub tool: ToolSummary,
    pub reports: Vec<CommentReport>,
    pub edit_history: Vec<CommentEdit>,
}

/// Trim and bound comment content
pub fn check_content(content: &str) -> crate::error::MarketResult<String> {
    let content = content.trim();
    if content.is_empty() {
        return Err(crate::error::MarketError::Validation(
            "Comment content is required".to_string(),
        ));
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(crate::error::MarketError::Validation(
            "Comment is too long (max 1000 characters)".to_string(),
        ));
    }
    Ok(content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_bounds() {
        let query = CommentQuery {
            page: Some(0),
            limit: Some(500),
            sort: Some("popular".to_string()),
        };
        assert_eq!(query.normalized(), (1, MAX_PAGE_SIZE, CommentSort::Popular));

        let defaults = CommentQuery::default().normalized();
        assert_eq!(defaults, (1, DEFAULT_PAGE_SIZE, CommentSort::Newest));
        assert_eq!(CommentSort::parse(Some("bogus")), CommentSort::Newest);
    }

    #[test]
    fn test_pagination() {
        let p = Pagination::new(1, 20, 41);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next_page);

        let empty = Pagination::new(1, 20, 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next_page);
    }

    #[test]
    fn test_check_content() {
        assert_eq!(check_content("  hi  ").unwrap(), "hi");
        assert!(check_content("   ").is_err());
        assert!(check_content(&"x".repeat(1001)).is_err());
        assert!(check_content(&"é".repeat(1000)).is_ok());
    }
}
