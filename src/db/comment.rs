/// Comment, report, edit and vote records
use crate::db::{parse_timestamp, text_enum};
use crate::error::MarketResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

text_enum! {
    CommentStatus, "comment status" {
        Approved => "approved",
        Pending => "pending",
        Rejected => "rejected",
        Reported => "reported",
        Deleted => "deleted",
    }
}

text_enum! {
    ReportReason, "report reason" {
        Spam => "spam",
        Inappropriate => "inappropriate",
        Harassment => "harassment",
        Misinformation => "misinformation",
        Other => "other",
    }
}

text_enum! {
    VoteType, "vote type" {
        Upvote => "upvote",
        Downvote => "downvote",
    }
}

impl VoteType {
    /// Tally column this vote counts towards
    pub fn column(&self) -> &'static str {
        match self {
            VoteType::Upvote => "upvotes",
            VoteType::Downvote => "downvotes",
        }
    }
}

pub const COMMENT_COLUMNS: &str = "c.id, c.tool_id, c.user_id, c.parent_id, c.content, c.status, \
     c.upvotes, c.downvotes, c.is_edited, c.reply_count, c.created_at, c.updated_at";

/// Comment record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub tool_id: String,
    pub user_id: String,
    pub parent_id: Option<String>,
    pub content: String,
    pub status: CommentStatus,
    pub upvotes: i64,
    pub downvotes: i64,
    pub is_edited: bool,
    pub reply_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn from_row(row: &SqliteRow) -> MarketResult<Self> {
        Ok(Comment {
            id: row.get("id"),
            tool_id: row.get("tool_id"),
            user_id: row.get("user_id"),
            parent_id: row.get("parent_id"),
            content: row.get("content"),
            status: CommentStatus::parse(&row.get::<String, _>("status"))?,
            upvotes: row.get("upvotes"),
            downvotes: row.get("downvotes"),
            is_edited: row.get("is_edited"),
            reply_count: row.get("reply_count"),
            created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
            updated_at: parse_timestamp(&row.get::<String, _>("updated_at"))?,
        })
    }

    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }
}

/// A single report filed against a comment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentReport {
    pub reported_by: String,
    pub reason: ReportReason,
    pub description: String,
    pub reported_at: DateTime<Utc>,
}

impl CommentReport {
    pub fn from_row(row: &SqliteRow) -> MarketResult<Self> {
        Ok(CommentReport {
            reported_by: row.get("reported_by"),
            reason: ReportReason::parse(&row.get::<String, _>("reason"))?,
            description: row.get("description"),
            reported_at: parse_timestamp(&row.get::<String, _>("reported_at"))?,
        })
    }
}

/// Previous content of an edited comment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentEdit {
    pub content: String,
    pub edited_at: DateTime<Utc>,
}

impl CommentEdit {
    pub fn from_row(row: &SqliteRow) -> MarketResult<Self> {
        Ok(CommentEdit {
            content: row.get("content"),
            edited_at: parse_timestamp(&row.get::<String, _>("edited_at"))?,
        })
    }
}

/// Public author details shown next to a comment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentAuthor {
    pub id: String,
    pub company_name: String,
    pub company_logo_url: String,
}
