/// Comment manager using runtime queries
use crate::{
    aggregates,
    auth::AuthUser,
    cache::{keys, Cache, InvalidationCoordinator},
    comments::{
        check_content, CommentPage, CommentQuery, CommentView, ModerationAuthor, ModerationView,
        NewComment, Pagination, ReportOutcome, ReportRequest, ToolSummary, VoteOutcome,
        DELETED_PLACEHOLDER, EDIT_WINDOW_HOURS, MAX_REPORT_DESCRIPTION_CHARS, REPLIES_PER_COMMENT,
    },
    db::{
        self,
        comment::{
            Comment, CommentAuthor, CommentEdit, CommentReport, CommentStatus, ReportReason,
            VoteType, COMMENT_COLUMNS,
        },
    },
    error::{MarketError, MarketResult},
    metrics, moderation,
};
use chrono::{Duration, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use validator::Validate;

/// Comment columns plus author fields
fn select_with_author() -> String {
    format!(
        "SELECT {}, u.company_name AS author_company, u.company_logo_url AS author_logo,
             u.email AS author_email
         FROM comments c LEFT JOIN users u ON u.id = c.user_id",
        COMMENT_COLUMNS
    )
}

/// Comment columns plus author and tool fields
fn select_for_moderation() -> String {
    format!(
        "SELECT {}, u.company_name AS author_company, u.company_logo_url AS author_logo,
             u.email AS author_email, t.name AS tool_name, t.slug AS tool_slug
         FROM comments c
         LEFT JOIN users u ON u.id = c.user_id
         LEFT JOIN tools t ON t.id = c.tool_id",
        COMMENT_COLUMNS
    )
}

fn author_from_row(row: &SqliteRow, user_id: &str) -> CommentAuthor {
    CommentAuthor {
        id: user_id.to_string(),
        company_name: row
            .get::<Option<String>, _>("author_company")
            .unwrap_or_default(),
        company_logo_url: row.get::<Option<String>, _>("author_logo").unwrap_or_default(),
    }
}

/// Per-request lookups shared by every comment on a page
struct ViewerContext {
    votes: HashMap<String, VoteType>,
    reports: HashMap<String, i64>,
}

impl ViewerContext {
    fn view(&self, row: &SqliteRow) -> MarketResult<CommentView> {
        let comment = Comment::from_row(row)?;
        let report_count = self.reports.get(&comment.id).copied().unwrap_or(0);

        Ok(CommentView {
            user: author_from_row(row, &comment.user_id),
            user_vote: self.votes.get(&comment.id).copied(),
            is_reported: report_count > 0,
            report_count,
            replies: None,
            has_more_replies: None,
            comment,
        })
    }
}

/// Move an approved comment to reported, once
///
/// The status guard makes a repeated call a no-op, so the approved counter
/// is decremented exactly once per transition. Returns whether the
/// transition happened.
pub(crate) async fn mark_reported(
    conn: &mut SqliteConnection,
    comment_id: &str,
    tool_id: &str,
) -> MarketResult<bool> {
    let result = sqlx::query(
        "UPDATE comments SET status = 'reported', updated_at = ?2
         WHERE id = ?1 AND status = 'approved'",
    )
    .bind(comment_id)
    .bind(db::timestamp(Utc::now()))
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 1 {
        aggregates::comment_left_approved(conn, tool_id).await?;
        return Ok(true);
    }

    Ok(false)
}

/// Comment manager service
pub struct CommentManager {
    db: SqlitePool,
    cache: Cache,
    invalidation: InvalidationCoordinator,
}

impl CommentManager {
    pub fn new(db: SqlitePool, cache: Cache, invalidation: InvalidationCoordinator) -> Self {
        Self {
            db,
            cache,
            invalidation,
        }
    }

    /// Load a comment that belongs to the given tool
    async fn find_in_tool(&self, tool_id: &str, comment_id: &str) -> MarketResult<Comment> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM comments c WHERE c.id = ?1 AND c.tool_id = ?2",
            COMMENT_COLUMNS
        ))
        .bind(comment_id)
        .bind(tool_id)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref()
            .map(Comment::from_row)
            .transpose()?
            .ok_or_else(|| MarketError::NotFound("Comment not found".to_string()))
    }

    async fn find(&self, comment_id: &str) -> MarketResult<Comment> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM comments c WHERE c.id = ?1",
            COMMENT_COLUMNS
        ))
        .bind(comment_id)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref()
            .map(Comment::from_row)
            .transpose()?
            .ok_or_else(|| MarketError::NotFound("Comment not found".to_string()))
    }

    /// Drop cached tool documents along with the comment pages
    async fn counters_changed(&self, tool_id: &str) {
        let slug: Option<String> =
            match sqlx::query_scalar("SELECT slug FROM tools WHERE id = ?1")
                .bind(tool_id)
                .fetch_optional(&self.db)
                .await
            {
                Ok(slug) => slug,
                Err(e) => {
                    warn!("Slug lookup for tool {} failed: {}", tool_id, e);
                    None
                }
            };
        self.invalidation
            .comment_counters_changed(tool_id, slug.as_deref())
            .await;
    }

    async fn viewer_context(
        &self,
        tool_id: &str,
        viewer: Option<&AuthUser>,
    ) -> MarketResult<ViewerContext> {
        let mut votes = HashMap::new();
        if let Some(viewer) = viewer {
            let rows = sqlx::query(
                "SELECT v.comment_id, v.vote_type FROM comment_votes v
                 JOIN comments c ON c.id = v.comment_id
                 WHERE v.user_id = ?1 AND c.tool_id = ?2",
            )
            .bind(&viewer.user_id)
            .bind(tool_id)
            .fetch_all(&self.db)
            .await?;

            for row in rows {
                votes.insert(
                    row.get::<String, _>("comment_id"),
                    VoteType::parse(&row.get::<String, _>("vote_type"))?,
                );
            }
        }

        let reports = sqlx::query(
            "SELECT r.comment_id, COUNT(*) AS n FROM comment_reports r
             JOIN comments c ON c.id = r.comment_id
             WHERE c.tool_id = ?1 GROUP BY r.comment_id",
        )
        .bind(tool_id)
        .fetch_all(&self.db)
        .await?
        .iter()
        .map(|row| (row.get::<String, _>("comment_id"), row.get::<i64, _>("n")))
        .collect();

        Ok(ViewerContext { votes, reports })
    }

    /// One page of top-level comments with their first replies
    pub async fn list(
        &self,
        tool_id: &str,
        viewer: Option<&AuthUser>,
        query: &CommentQuery,
    ) -> MarketResult<CommentPage> {
        let (page, limit, sort) = query.normalized();
        let key = keys::comment_page(tool_id, page, limit, sort.as_str(), viewer);

        if let Some(cached) = self.cache.get_json("comments", &key).await {
            return Ok(cached);
        }

        let is_admin = viewer.map(|v| v.is_admin()).unwrap_or(false);
        let (top_statuses, reply_statuses) = if is_admin {
            ("('approved', 'reported', 'deleted')", "('approved', 'reported')")
        } else {
            ("('approved', 'deleted')", "('approved')")
        };

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM comments WHERE tool_id = ?1 AND parent_id IS NULL AND status IN {}",
            top_statuses
        ))
        .bind(tool_id)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query(&format!(
            "{} WHERE c.tool_id = ?1 AND c.parent_id IS NULL AND c.status IN {}
             ORDER BY {} LIMIT ?2 OFFSET ?3",
            select_with_author(),
            top_statuses,
            sort.order_by()
        ))
        .bind(tool_id)
        .bind(limit as i64)
        .bind((page as i64 - 1) * limit as i64)
        .fetch_all(&self.db)
        .await?;

        let ctx = self.viewer_context(tool_id, viewer).await?;
        let reply_sql = format!(
            "{} WHERE c.parent_id = ?1 AND c.status IN {}
             ORDER BY c.created_at ASC, c.rowid ASC LIMIT ?2",
            select_with_author(),
            reply_statuses
        );

        let mut comments = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut view = ctx.view(row)?;

            let replies = sqlx::query(&reply_sql)
                .bind(&view.comment.id)
                .bind(REPLIES_PER_COMMENT)
                .fetch_all(&self.db)
                .await?
                .iter()
                .map(|r| ctx.view(r))
                .collect::<MarketResult<Vec<_>>>()?;

            view.has_more_replies = Some(view.comment.reply_count > REPLIES_PER_COMMENT);
            view.replies = Some(replies);
            comments.push(view);
        }

        let result = CommentPage {
            comments,
            pagination: Pagination::new(page, limit, total),
        };

        self.cache
            .put_json(&key, &result, self.cache.comment_ttl())
            .await;
        Ok(result)
    }

    /// Single comment with author, as seen by `viewer`
    async fn view_of(&self, comment_id: &str, viewer: &AuthUser) -> MarketResult<CommentView> {
        let row = sqlx::query(&format!("{} WHERE c.id = ?1", select_with_author()))
            .bind(comment_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| MarketError::NotFound("Comment not found".to_string()))?;

        let comment = Comment::from_row(&row)?;
        let ctx = self.viewer_context(&comment.tool_id, Some(viewer)).await?;
        ctx.view(&row)
    }

    /// Post a comment or a reply; new comments are approved
    pub async fn create(
        &self,
        author: &AuthUser,
        tool_id: &str,
        input: NewComment,
    ) -> MarketResult<CommentView> {
        let content = check_content(&input.content)?;

        let tool_exists: Option<String> = sqlx::query_scalar("SELECT id FROM tools WHERE id = ?1")
            .bind(tool_id)
            .fetch_optional(&self.db)
            .await?;
        if tool_exists.is_none() {
            return Err(MarketError::NotFound("Tool not found".to_string()));
        }

        let parent_id = input.parent_comment.filter(|p| !p.trim().is_empty());
        if let Some(parent_id) = parent_id.as_deref() {
            let parent = match self.find(parent_id).await {
                Ok(parent) => Some(parent),
                Err(MarketError::NotFound(_)) => None,
                Err(e) => return Err(e),
            };
            let valid = parent
                .map(|p| p.tool_id == tool_id && !p.is_reply() && p.status != CommentStatus::Deleted)
                .unwrap_or(false);
            if !valid {
                return Err(MarketError::Validation(
                    "Invalid parent comment".to_string(),
                ));
            }
        }

        let id = db::new_id();
        let now = Utc::now();
        let stamp = db::timestamp(now);

        let mut tx = self.db.begin().await?;
        sqlx::query(
            "INSERT INTO comments (id, tool_id, user_id, parent_id, content, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'approved', ?6, ?6)",
        )
        .bind(&id)
        .bind(tool_id)
        .bind(&author.user_id)
        .bind(&parent_id)
        .bind(&content)
        .bind(&stamp)
        .execute(&mut *tx)
        .await?;

        aggregates::comment_created(&mut *tx, tool_id, parent_id.as_deref(), now).await?;
        tx.commit().await?;

        debug!("Comment {} posted on tool {}", id, tool_id);
        self.counters_changed(tool_id).await;

        self.view_of(&id, author).await
    }

    /// Author edit within the edit window; previous content is kept
    pub async fn edit(
        &self,
        author: &AuthUser,
        tool_id: &str,
        comment_id: &str,
        content: &str,
    ) -> MarketResult<CommentView> {
        let content = check_content(content)?;
        let comment = self.find_in_tool(tool_id, comment_id).await?;

        if comment.status == CommentStatus::Deleted {
            return Err(MarketError::NotFound("Comment not found".to_string()));
        }
        if comment.user_id != author.user_id {
            return Err(MarketError::Forbidden(
                "Not authorized to edit this comment".to_string(),
            ));
        }

        let now = Utc::now();
        if comment.created_at < now - Duration::hours(EDIT_WINDOW_HOURS) {
            return Err(MarketError::Forbidden(
                "Comment can only be edited within 24 hours".to_string(),
            ));
        }

        let stamp = db::timestamp(now);
        let mut tx = self.db.begin().await?;

        sqlx::query("INSERT INTO comment_edits (comment_id, content, edited_at) VALUES (?1, ?2, ?3)")
            .bind(comment_id)
            .bind(&comment.content)
            .bind(&stamp)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE comments SET content = ?2, is_edited = 1, updated_at = ?3 WHERE id = ?1")
            .bind(comment_id)
            .bind(&content)
            .bind(&stamp)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        self.invalidation.comments_changed(tool_id).await;

        self.view_of(comment_id, author).await
    }

    /// Delete a comment; one with replies becomes a placeholder
    ///
    /// Returns true when the comment was soft-deleted.
    pub async fn delete(&self, actor: &AuthUser, tool_id: &str, comment_id: &str) -> MarketResult<bool> {
        let comment = self.find_in_tool(tool_id, comment_id).await?;

        if comment.status == CommentStatus::Deleted {
            return Err(MarketError::NotFound("Comment not found".to_string()));
        }
        if comment.user_id != actor.user_id && !actor.is_admin() {
            return Err(MarketError::Forbidden(
                "Not authorized to delete this comment".to_string(),
            ));
        }

        let mut tx = self.db.begin().await?;

        let soft = comment.reply_count > 0;
        if soft {
            sqlx::query(
                "UPDATE comments SET content = ?2, status = 'deleted', updated_at = ?3 WHERE id = ?1",
            )
            .bind(comment_id)
            .bind(DELETED_PLACEHOLDER)
            .bind(db::timestamp(Utc::now()))
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query("DELETE FROM comments WHERE id = ?1")
                .bind(comment_id)
                .execute(&mut *tx)
                .await?;

            aggregates::comment_removed(
                &mut *tx,
                tool_id,
                comment.parent_id.as_deref(),
                comment.status == CommentStatus::Approved,
            )
            .await?;
        }

        tx.commit().await?;

        info!(
            "Comment {} deleted ({}) by {}",
            comment_id,
            if soft { "soft" } else { "hard" },
            actor.user_id
        );
        self.counters_changed(tool_id).await;

        Ok(soft)
    }

    /// Toggle a vote: same type removes it, the other type switches it
    pub async fn vote(
        &self,
        voter: &AuthUser,
        tool_id: &str,
        comment_id: &str,
        vote_type: &str,
    ) -> MarketResult<VoteOutcome> {
        let vote_type = VoteType::parse(vote_type)
            .map_err(|_| MarketError::Validation("Invalid vote type".to_string()))?;

        let comment = self.find_in_tool(tool_id, comment_id).await?;
        if comment.status == CommentStatus::Deleted {
            return Err(MarketError::NotFound("Comment not found".to_string()));
        }

        // A concurrent first vote can win the insert; the retry toggles it
        let outcome = db::retry_on_unique(db::UNIQUE_RACE_ATTEMPTS, || {
            self.apply_vote(&voter.user_id, comment_id, vote_type)
        })
        .await?;

        self.invalidation.comments_changed(tool_id).await;
        Ok(outcome)
    }

    async fn apply_vote(
        &self,
        user_id: &str,
        comment_id: &str,
        vote_type: VoteType,
    ) -> MarketResult<VoteOutcome> {
        let mut tx = self.db.begin().await?;
        let now = db::timestamp(Utc::now());

        let existing: Option<String> = sqlx::query_scalar(
            "SELECT vote_type FROM comment_votes WHERE comment_id = ?1 AND user_id = ?2",
        )
        .bind(comment_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        let previous = existing.as_deref().map(VoteType::parse).transpose()?;

        let (action, tally_sql) = match previous {
            None => {
                sqlx::query(
                    "INSERT INTO comment_votes (id, comment_id, user_id, vote_type, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                )
                .bind(db::new_id())
                .bind(comment_id)
                .bind(user_id)
                .bind(vote_type.as_str())
                .bind(&now)
                .execute(&mut *tx)
                .await?;

                let col = vote_type.column();
                ("added", format!("{col} = {col} + 1"))
            }
            Some(old) if old == vote_type => {
                sqlx::query("DELETE FROM comment_votes WHERE comment_id = ?1 AND user_id = ?2")
                    .bind(comment_id)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await?;

                let col = vote_type.column();
                ("removed", format!("{col} = MAX({col} - 1, 0)"))
            }
            Some(old) => {
                sqlx::query(
                    "UPDATE comment_votes SET vote_type = ?3, updated_at = ?4
                     WHERE comment_id = ?1 AND user_id = ?2",
                )
                .bind(comment_id)
                .bind(user_id)
                .bind(vote_type.as_str())
                .bind(&now)
                .execute(&mut *tx)
                .await?;

                let (old_col, new_col) = (old.column(), vote_type.column());
                (
                    "added",
                    format!("{old_col} = MAX({old_col} - 1, 0), {new_col} = {new_col} + 1"),
                )
            }
        };

        let row = sqlx::query(&format!(
            "UPDATE comments SET {} WHERE id = ?1 RETURNING upvotes, downvotes",
            tally_sql
        ))
        .bind(comment_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| MarketError::NotFound("Comment not found".to_string()))?;

        tx.commit().await?;

        Ok(VoteOutcome {
            message: format!("Vote {}", action),
            action: action.to_string(),
            previous_vote: previous,
            upvotes: row.get("upvotes"),
            downvotes: row.get("downvotes"),
        })
    }

    /// File a report; an approved comment becomes reported
    pub async fn report(
        &self,
        reporter: &AuthUser,
        tool_id: &str,
        comment_id: &str,
        request: ReportRequest,
    ) -> MarketResult<ReportOutcome> {
        request.validate()?;
        let reason = ReportReason::parse(&request.reason)
            .map_err(|_| MarketError::Validation("Invalid report reason".to_string()))?;
        let description = request.description.unwrap_or_default().trim().to_string();
        if description.chars().count() > MAX_REPORT_DESCRIPTION_CHARS {
            return Err(MarketError::Validation(
                "Description is too long (max 500 characters)".to_string(),
            ));
        }

        let comment = self.find_in_tool(tool_id, comment_id).await?;
        if comment.status == CommentStatus::Deleted {
            return Err(MarketError::NotFound("Comment not found".to_string()));
        }

        let mut tx = self.db.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO comment_reports (comment_id, reported_by, reason, description, reported_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(comment_id)
        .bind(&reporter.user_id)
        .bind(reason.as_str())
        .bind(&description)
        .bind(db::timestamp(Utc::now()))
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(e) if db::is_unique_violation(&e) => {
                return Err(MarketError::DuplicateAction(
                    "You have already reported this comment".to_string(),
                ))
            }
            Err(e) => return Err(e.into()),
        }

        if moderation::report_transitions(comment.status) {
            mark_reported(&mut *tx, comment_id, tool_id).await?;
        }

        let status: String = sqlx::query_scalar("SELECT status FROM comments WHERE id = ?1")
            .bind(comment_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        info!("Comment {} reported for {}", comment_id, reason);
        metrics::record_report_created(reason.as_str());
        self.counters_changed(tool_id).await;

        Ok(ReportOutcome {
            message: "Comment reported successfully".to_string(),
            status: CommentStatus::parse(&status)?,
        })
    }

    async fn moderation_view(&self, row: &SqliteRow) -> MarketResult<ModerationView> {
        let comment = Comment::from_row(row)?;

        let reports = sqlx::query(
            "SELECT reported_by, reason, description, reported_at FROM comment_reports
             WHERE comment_id = ?1 ORDER BY id ASC",
        )
        .bind(&comment.id)
        .fetch_all(&self.db)
        .await?
        .iter()
        .map(CommentReport::from_row)
        .collect::<MarketResult<Vec<_>>>()?;

        let edit_history = sqlx::query(
            "SELECT content, edited_at FROM comment_edits WHERE comment_id = ?1 ORDER BY id ASC",
        )
        .bind(&comment.id)
        .fetch_all(&self.db)
        .await?
        .iter()
        .map(CommentEdit::from_row)
        .collect::<MarketResult<Vec<_>>>()?;

        Ok(ModerationView {
            user: ModerationAuthor {
                id: comment.user_id.clone(),
                company_name: row.get::<Option<String>, _>("author_company").unwrap_or_default(),
                email: row.get::<Option<String>, _>("author_email").unwrap_or_default(),
                company_logo_url: row.get::<Option<String>, _>("author_logo").unwrap_or_default(),
            },
            tool: ToolSummary {
                id: comment.tool_id.clone(),
                name: row.get::<Option<String>, _>("tool_name").unwrap_or_default(),
                slug: row.get::<Option<String>, _>("tool_slug").unwrap_or_default(),
            },
            reports,
            edit_history,
            comment,
        })
    }

    /// Comments that are reported or carry any report, most recently changed first
    pub async fn reported(&self) -> MarketResult<Vec<ModerationView>> {
        let rows = sqlx::query(&format!(
            "{} WHERE c.status = 'reported'
                OR EXISTS (SELECT 1 FROM comment_reports r WHERE r.comment_id = c.id)
             ORDER BY c.updated_at DESC, c.rowid DESC",
            select_for_moderation()
        ))
        .fetch_all(&self.db)
        .await?;

        let mut views = Vec::with_capacity(rows.len());
        for row in &rows {
            views.push(self.moderation_view(row).await?);
        }
        Ok(views)
    }

    /// Comment detail for moderation
    pub async fn detail(&self, comment_id: &str) -> MarketResult<ModerationView> {
        let row = sqlx::query(&format!("{} WHERE c.id = ?1", select_for_moderation()))
            .bind(comment_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| MarketError::NotFound("Comment not found".to_string()))?;

        self.moderation_view(&row).await
    }

    /// Admin status decision on a comment
    pub async fn moderate(&self, comment_id: &str, status: &str) -> MarketResult<ModerationView> {
        let to = CommentStatus::parse(status)?;
        let comment = self.find(comment_id).await?;
        moderation::check_comment_moderation(comment.status, to)?;

        let mut tx = self.db.begin().await?;

        let result = sqlx::query(
            "UPDATE comments SET status = ?2, updated_at = ?3 WHERE id = ?1 AND status = ?4",
        )
        .bind(comment_id)
        .bind(to.as_str())
        .bind(db::timestamp(Utc::now()))
        .bind(comment.status.as_str())
        .execute(&mut *tx)
        .await?;

        // Status moved underneath us; counters only follow our own transition
        if result.rows_affected() == 1 {
            match moderation::approved_delta(comment.status, to) {
                1 => aggregates::comment_entered_approved(&mut *tx, &comment.tool_id).await?,
                -1 => aggregates::comment_left_approved(&mut *tx, &comment.tool_id).await?,
                _ => {}
            }
        }

        if to == CommentStatus::Approved {
            sqlx::query("DELETE FROM comment_reports WHERE comment_id = ?1")
                .bind(comment_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        info!("Comment {} moderated: {} -> {}", comment_id, comment.status, to);
        metrics::record_moderation_action(to.as_str(), "comment");
        self.counters_changed(&comment.tool_id).await;

        self.detail(comment_id).await
    }
}
