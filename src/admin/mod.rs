/// Admin dashboard figures
///
/// Tool moderation and comment moderation live with their managers; this
/// module only aggregates counts across them.
use crate::error::MarketResult;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCounts {
    pub approved: i64,
    pub pending: i64,
    pub rejected: i64,
    /// Featured and approved
    pub featured: i64,
    pub all: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCounts {
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentCounts {
    pub reported: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminStats {
    pub tools: ToolCounts,
    pub users: UserCounts,
    pub comments: CommentCounts,
}

/// Admin statistics service
pub struct AdminManager {
    db: SqlitePool,
}

impl AdminManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn stats(&self) -> MarketResult<AdminStats> {
        let tools = sqlx::query(
            "SELECT
                 COUNT(*) AS all_tools,
                 COALESCE(SUM(status = 'approved'), 0) AS approved,
                 COALESCE(SUM(status = 'pending'), 0) AS pending,
                 COALESCE(SUM(status = 'rejected'), 0) AS rejected,
                 COALESCE(SUM(status = 'approved' AND is_featured = 1), 0) AS featured
             FROM tools",
        )
        .fetch_one(&self.db)
        .await?;

        let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await?;

        let reported: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM comments c
             WHERE c.status = 'reported'
                OR EXISTS (SELECT 1 FROM comment_reports r WHERE r.comment_id = c.id)",
        )
        .fetch_one(&self.db)
        .await?;

        Ok(AdminStats {
            tools: ToolCounts {
                approved: tools.get("approved"),
                pending: tools.get("pending"),
                rejected: tools.get("rejected"),
                featured: tools.get("featured"),
                all: tools.get("all_tools"),
            },
            users: UserCounts { total: users },
            comments: CommentCounts { reported },
        })
    }
}
