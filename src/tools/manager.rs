/// Tool manager using runtime queries
use crate::{
    aggregates,
    auth::AuthUser,
    cache::{keys, Cache, InvalidationCoordinator},
    db::{
        self,
        media::MediaType,
        tool::{Source, Submitter, Tool, ToolStatus, TOOL_COLUMNS},
    },
    error::{MarketError, MarketResult},
    media_store::MediaStorage,
    metrics, moderation,
    slug::{slugify, SlugAssigner},
    tools::{
        NewTool, RatingOutcome, Suggestion, ToolModeration, ToolUpdate, FEATURED_LIMIT,
        SEARCH_LIMIT, SUGGESTION_LIMIT,
    },
};
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use tracing::{debug, info, warn};
use validator::Validate;

/// Tool manager service
pub struct ToolManager {
    db: SqlitePool,
    cache: Cache,
    invalidation: InvalidationCoordinator,
    slugs: SlugAssigner,
    storage: Arc<dyn MediaStorage>,
}

/// Escape LIKE wildcards in user input
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn encode_tags(tags: &[String]) -> MarketResult<String> {
    serde_json::to_string(tags).map_err(|e| MarketError::Internal(format!("Tag encoding failed: {}", e)))
}

fn encode_visual(visual: &Option<crate::db::tool::Visual>) -> MarketResult<Option<String>> {
    visual
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| MarketError::Internal(format!("Visual encoding failed: {}", e)))
}

impl ToolManager {
    pub fn new(
        db: SqlitePool,
        cache: Cache,
        invalidation: InvalidationCoordinator,
        storage: Arc<dyn MediaStorage>,
    ) -> Self {
        Self {
            slugs: SlugAssigner::new(db.clone()),
            db,
            cache,
            invalidation,
            storage,
        }
    }

    async fn fetch_many(&self, sql: &str, binds: &[String]) -> MarketResult<Vec<Tool>> {
        let mut query = sqlx::query(sql);
        for value in binds {
            query = query.bind(value);
        }

        query
            .fetch_all(&self.db)
            .await?
            .iter()
            .map(Tool::from_row)
            .collect()
    }

    /// Load any tool regardless of status
    pub async fn find(&self, id: &str) -> MarketResult<Option<Tool>> {
        let row = sqlx::query(&format!("SELECT {} FROM tools t WHERE t.id = ?1", TOOL_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        row.as_ref().map(Tool::from_row).transpose()
    }

    /// Load a tool or fail with NotFound
    pub async fn require(&self, id: &str) -> MarketResult<Tool> {
        self.find(id)
            .await?
            .ok_or_else(|| MarketError::NotFound("Tool not found".to_string()))
    }

    /// Approved tools, featured first then newest
    pub async fn list_approved(&self) -> MarketResult<Vec<Tool>> {
        if let Some(tools) = self.cache.get_json("tool_list", keys::ALL_TOOLS).await {
            return Ok(tools);
        }

        let tools = self
            .fetch_many(
                &format!(
                    "SELECT {} FROM tools t WHERE t.status = 'approved'
                     ORDER BY t.is_featured DESC, t.created_at DESC, t.rowid DESC",
                    TOOL_COLUMNS
                ),
                &[],
            )
            .await?;

        self.cache
            .put_json(keys::ALL_TOOLS, &tools, self.cache.tool_ttl())
            .await;
        Ok(tools)
    }

    /// Approved featured tools
    pub async fn featured(&self) -> MarketResult<Vec<Tool>> {
        if let Some(tools) = self.cache.get_json("tool_list", keys::FEATURED_TOOLS).await {
            return Ok(tools);
        }

        let tools = self
            .fetch_many(
                &format!(
                    "SELECT {} FROM tools t WHERE t.status = 'approved' AND t.is_featured = 1
                     ORDER BY t.created_at DESC, t.rowid DESC LIMIT {}",
                    TOOL_COLUMNS, FEATURED_LIMIT
                ),
                &[],
            )
            .await?;

        self.cache
            .put_json(keys::FEATURED_TOOLS, &tools, self.cache.tool_ttl())
            .await;
        Ok(tools)
    }

    /// Approved tool by id
    pub async fn get_public(&self, id: &str) -> MarketResult<Tool> {
        let key = keys::tool_by_id(id);
        if let Some(tool) = self.cache.get_json("tool", &key).await {
            return Ok(tool);
        }

        let tool = self
            .find(id)
            .await?
            .filter(|t| t.status == ToolStatus::Approved)
            .ok_or_else(|| MarketError::NotFound("Tool not found".to_string()))?;

        self.cache.put_json(&key, &tool, self.cache.tool_ttl()).await;
        Ok(tool)
    }

    /// Approved tool by slug
    pub async fn get_by_slug(&self, slug: &str) -> MarketResult<Tool> {
        let key = keys::tool_by_slug(slug);
        if let Some(tool) = self.cache.get_json("tool", &key).await {
            return Ok(tool);
        }

        let row = sqlx::query(&format!(
            "SELECT {} FROM tools t WHERE t.slug = ?1 AND t.status = 'approved'",
            TOOL_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(&self.db)
        .await?;

        let tool = row
            .as_ref()
            .map(Tool::from_row)
            .transpose()?
            .ok_or_else(|| MarketError::NotFound("Tool not found".to_string()))?;

        self.cache.put_json(&key, &tool, self.cache.tool_ttl()).await;
        Ok(tool)
    }

    /// Every tool a user submitted, newest first
    pub async fn my_tools(&self, user_id: &str) -> MarketResult<Vec<Tool>> {
        self.fetch_many(
            &format!(
                "SELECT {} FROM tools t WHERE t.submitted_by = ?1
                 ORDER BY t.created_at DESC, t.rowid DESC",
                TOOL_COLUMNS
            ),
            &[user_id.to_string()],
        )
        .await
    }

    /// Approved tools matching every whitespace-separated term
    pub async fn search(&self, query: &str) -> MarketResult<Vec<Tool>> {
        let terms: Vec<String> = query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();

        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = format!(
            "SELECT {} FROM tools t WHERE t.status = 'approved'",
            TOOL_COLUMNS
        );
        let mut binds = Vec::with_capacity(terms.len());

        for (i, term) in terms.iter().enumerate() {
            let n = i + 1;
            sql.push_str(&format!(
                " AND (lower(t.name) LIKE ?{n} ESCAPE '\\' OR lower(t.tagline) LIKE ?{n} ESCAPE '\\'
                   OR lower(t.description) LIKE ?{n} ESCAPE '\\' OR lower(t.tags) LIKE ?{n} ESCAPE '\\')"
            ));
            binds.push(like_pattern(term));
        }

        sql.push_str(&format!(
            " ORDER BY t.is_featured DESC, t.rating_average DESC, t.created_at DESC LIMIT {}",
            SEARCH_LIMIT
        ));

        let tools = self.fetch_many(&sql, &binds).await?;
        debug!("Search '{}' matched {} tools", query, tools.len());
        Ok(tools)
    }

    /// Name suggestions, prefix matches first
    pub async fn suggestions(&self, query: &str) -> MarketResult<Vec<Suggestion>> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT id, name, slug FROM tools
             WHERE status = 'approved' AND lower(name) LIKE ?1 ESCAPE '\\'
             ORDER BY (substr(lower(name), 1, length(?2)) = ?2) DESC, name ASC
             LIMIT ?3",
        )
        .bind(like_pattern(&query))
        .bind(&query)
        .bind(SUGGESTION_LIMIT)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Suggestion {
                id: row.get("id"),
                name: row.get("name"),
                slug: row.get("slug"),
            })
            .collect())
    }

    /// Submit a tool; it starts pending with a generated slug
    pub async fn create(&self, owner: &AuthUser, mut tool: NewTool) -> MarketResult<Tool> {
        tool.name = tool.name.trim().to_string();
        tool.validate()?;

        let id = db::new_id();
        let now = db::timestamp(Utc::now());
        let tags = encode_tags(&tool.tags)?;
        let visual = encode_visual(&tool.visual.map(|v| v.normalized()))?;
        let base = slugify(&tool.name);

        let mut attempt = 0;
        loop {
            let (slug, found_at) = self.slugs.find_available(&base, None, attempt).await?;

            let result = sqlx::query(
                "INSERT INTO tools (id, name, slug, tagline, description, website_url, app_store_url,
                     play_store_url, tags, status, is_featured, submitted_by, logo_url, visual, source,
                     created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, ?11, ?12, ?13, ?14, ?15, ?15)",
            )
            .bind(&id)
            .bind(&tool.name)
            .bind(&slug)
            .bind(tool.tagline.trim())
            .bind(tool.description.trim())
            .bind(tool.website_url.trim())
            .bind(&tool.app_store_url)
            .bind(&tool.play_store_url)
            .bind(&tags)
            .bind(ToolStatus::Pending.as_str())
            .bind(&owner.user_id)
            .bind(&tool.logo_url)
            .bind(&visual)
            .bind(Source::Listed.as_str())
            .bind(&now)
            .execute(&self.db)
            .await;

            match result {
                Ok(_) => break,
                Err(e) if db::is_unique_violation_on(&e, "slug") => {
                    debug!("Slug {} taken at write time, retrying", slug);
                    attempt = found_at + 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!("Tool {} submitted by {}", id, owner.user_id);
        self.invalidation.tool_created().await;

        self.require(&id).await
    }

    /// Owner edit of a tool's content
    pub async fn update(&self, actor: &AuthUser, id: &str, update: ToolUpdate) -> MarketResult<Tool> {
        update.validate()?;

        let existing = self.require(id).await?;
        if existing.submitted_by != actor.user_id {
            return Err(MarketError::Forbidden(
                "Not authorized to edit this tool".to_string(),
            ));
        }

        let name = update
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| existing.name.clone());
        let name_changed = name != existing.name;

        let tagline = update.tagline.unwrap_or(existing.tagline);
        let description = update.description.unwrap_or(existing.description);
        let website_url = update.website_url.unwrap_or(existing.website_url);
        let app_store_url = update.app_store_url.or(existing.app_store_url);
        let play_store_url = update.play_store_url.or(existing.play_store_url);
        let tags = encode_tags(&update.tags.unwrap_or(existing.tags))?;
        let visual = encode_visual(&update.visual.map(|v| v.normalized()).or(existing.visual))?;
        let logo_url = update.logo_url.unwrap_or(existing.logo);

        let mut slug = existing.slug.clone();
        let mut attempt = 0;
        loop {
            if name_changed {
                let (candidate, found_at) = self
                    .slugs
                    .find_available(&slugify(&name), Some(id), attempt)
                    .await?;
                slug = candidate;
                attempt = found_at;
            }

            let result = sqlx::query(
                "UPDATE tools SET name = ?2, slug = ?3, tagline = ?4, description = ?5, website_url = ?6,
                     app_store_url = ?7, play_store_url = ?8, tags = ?9, visual = ?10, logo_url = ?11,
                     updated_at = ?12
                 WHERE id = ?1",
            )
            .bind(id)
            .bind(&name)
            .bind(&slug)
            .bind(tagline.trim())
            .bind(description.trim())
            .bind(website_url.trim())
            .bind(&app_store_url)
            .bind(&play_store_url)
            .bind(&tags)
            .bind(&visual)
            .bind(&logo_url)
            .bind(db::timestamp(Utc::now()))
            .execute(&self.db)
            .await;

            match result {
                Ok(_) => break,
                Err(e) if name_changed && db::is_unique_violation_on(&e, "slug") => {
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!("Tool {} updated by owner", id);
        self.invalidation
            .tool_changed(id, &[existing.slug.as_str(), slug.as_str()])
            .await;

        self.require(id).await
    }

    /// Create or change the caller's rating of an approved tool
    pub async fn rate(&self, user: &AuthUser, tool_id: &str, rating: i64) -> MarketResult<RatingOutcome> {
        if !(1..=5).contains(&rating) {
            return Err(MarketError::Validation(
                "Rating must be between 1 and 5".to_string(),
            ));
        }

        let tool = self
            .find(tool_id)
            .await?
            .filter(|t| t.status == ToolStatus::Approved)
            .ok_or_else(|| MarketError::NotFound("Tool not found".to_string()))?;

        // A concurrent first rating can win the insert; the retry takes the update path
        let stats = db::retry_on_unique(db::UNIQUE_RACE_ATTEMPTS, || {
            self.upsert_rating(&user.user_id, tool_id, rating)
        })
        .await?;

        self.invalidation.rating_changed(tool_id, &tool.slug).await;

        Ok(RatingOutcome {
            average_rating: stats.average_rating,
            number_of_ratings: stats.number_of_ratings,
            total_rating_sum: stats.total_rating_sum,
            user_rating: rating,
        })
    }

    async fn upsert_rating(
        &self,
        user_id: &str,
        tool_id: &str,
        rating: i64,
    ) -> MarketResult<crate::db::tool::RatingStats> {
        let mut tx = self.db.begin().await?;
        let now = db::timestamp(Utc::now());

        let previous: Option<i64> =
            sqlx::query_scalar("SELECT rating FROM ratings WHERE tool_id = ?1 AND user_id = ?2")
                .bind(tool_id)
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;

        let stats = match previous {
            None => {
                sqlx::query(
                    "INSERT INTO ratings (id, tool_id, user_id, rating, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                )
                .bind(db::new_id())
                .bind(tool_id)
                .bind(user_id)
                .bind(rating)
                .bind(&now)
                .execute(&mut *tx)
                .await?;

                aggregates::rating_added(&mut *tx, tool_id, rating).await?
            }
            Some(old) => {
                sqlx::query(
                    "UPDATE ratings SET rating = ?3, updated_at = ?4 WHERE tool_id = ?1 AND user_id = ?2",
                )
                .bind(tool_id)
                .bind(user_id)
                .bind(rating)
                .bind(&now)
                .execute(&mut *tx)
                .await?;

                aggregates::rating_changed(&mut *tx, tool_id, old, rating).await?
            }
        };

        tx.commit().await?;
        Ok(stats)
    }

    /// Tools with a given status, newest first, with submitter details
    pub async fn list_by_status(&self, status: Option<ToolStatus>) -> MarketResult<Vec<Tool>> {
        let filter = if status.is_some() { "WHERE t.status = ?1" } else { "" };
        let sql = format!(
            "SELECT {}, u.company_name AS submitter_company, u.email AS submitter_email
             FROM tools t LEFT JOIN users u ON u.id = t.submitted_by
             {} ORDER BY t.created_at DESC, t.rowid DESC",
            TOOL_COLUMNS, filter
        );

        let mut query = sqlx::query(&sql);
        if let Some(status) = status {
            query = query.bind(status.as_str());
        }

        query
            .fetch_all(&self.db)
            .await?
            .iter()
            .map(|row| {
                let mut tool = Tool::from_row(row)?;
                let company: Option<String> = row.get("submitter_company");
                let email: Option<String> = row.get("submitter_email");
                if let (Some(company_name), Some(email)) = (company, email) {
                    tool.submitter = Some(Submitter {
                        id: tool.submitted_by.clone(),
                        company_name,
                        email,
                    });
                }
                Ok(tool)
            })
            .collect()
    }

    /// Admin status and featured-flag change
    pub async fn moderate(&self, id: &str, decision: ToolModeration) -> MarketResult<Tool> {
        let existing = self.require(id).await?;

        let status = decision
            .status
            .as_deref()
            .map(moderation::check_tool_status)
            .transpose()?
            .unwrap_or(existing.status);
        let is_featured = decision.is_featured.unwrap_or(existing.is_featured);

        sqlx::query("UPDATE tools SET status = ?2, is_featured = ?3, updated_at = ?4 WHERE id = ?1")
            .bind(id)
            .bind(status.as_str())
            .bind(is_featured)
            .bind(db::timestamp(Utc::now()))
            .execute(&self.db)
            .await?;

        info!(
            "Tool {} moderated: {} -> {}, featured={}",
            id, existing.status, status, is_featured
        );
        metrics::record_moderation_action(status.as_str(), "tool");
        self.invalidation.tool_changed(id, &[&existing.slug]).await;

        self.require(id).await
    }

    /// Delete a tool and everything attached to it
    pub async fn delete(&self, id: &str) -> MarketResult<()> {
        let existing = self.require(id).await?;

        let media: Vec<(String, String)> =
            sqlx::query_as("SELECT public_id, media_type FROM media WHERE tool_id = ?1")
                .bind(id)
                .fetch_all(&self.db)
                .await?;

        sqlx::query("DELETE FROM tools WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;

        for (public_id, media_type) in media {
            let media_type = MediaType::parse(&media_type).unwrap_or(MediaType::Document);
            if let Err(e) = self.storage.delete(&public_id, media_type).await {
                warn!("Failed to delete stored media {}: {}", public_id, e);
            }
        }

        info!("Tool {} deleted", id);
        metrics::record_moderation_action("delete", "tool");
        self.invalidation.tool_changed(id, &[&existing.slug]).await;
        self.invalidation.comments_changed(id).await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::tests::settings;
    use crate::db::user::Role;
    use crate::media_store::DiskMediaStorage;

    struct Fixture {
        tools: ToolManager,
        cache: Cache,
        pool: SqlitePool,
        owner: AuthUser,
        _dir: tempfile::TempDir,
    }

    async fn add_user(pool: &SqlitePool, id: &str) -> AuthUser {
        let now = db::timestamp(Utc::now());
        sqlx::query(
            "INSERT INTO users (id, company_name, email, password_hash, created_at, updated_at)
             VALUES (?1, 'Acme', ?2, 'x', ?3, ?3)",
        )
        .bind(id)
        .bind(format!("{}@example.com", id))
        .bind(&now)
        .execute(pool)
        .await
        .unwrap();

        AuthUser {
            user_id: id.to_string(),
            role: Role::User,
        }
    }

    async fn fixture() -> Fixture {
        let pool = db::create_memory_pool().await.unwrap();
        let cache = Cache::in_memory(settings());
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(DiskMediaStorage::new(dir.path().to_path_buf(), "http://localhost"));
        let tools = ToolManager::new(
            pool.clone(),
            cache.clone(),
            InvalidationCoordinator::new(cache.clone()),
            storage,
        );
        let owner = add_user(&pool, "owner").await;

        Fixture {
            tools,
            cache,
            pool,
            owner,
            _dir: dir,
        }
    }

    fn submission(name: &str) -> NewTool {
        NewTool {
            name: name.to_string(),
            tagline: "Writes things".to_string(),
            description: "An assistant for writing marketing copy".to_string(),
            website_url: "https://example.com".to_string(),
            tags: vec!["ai".to_string(), "writing".to_string()],
            ..Default::default()
        }
    }

    async fn approve(f: &Fixture, id: &str) {
        f.tools
            .moderate(
                id,
                ToolModeration {
                    status: Some("approved".to_string()),
                    is_featured: None,
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_assigns_slugs_and_pending_status() {
        let f = fixture().await;

        let first = f.tools.create(&f.owner, submission("AI Content Writer!!")).await.unwrap();
        assert_eq!(first.slug, "ai-content-writer");
        assert_eq!(first.status, ToolStatus::Pending);

        let second = f.tools.create(&f.owner, submission("AI Content Writer!!")).await.unwrap();
        assert_eq!(second.slug, "ai-content-writer-1");
    }

    /// Claim `slug` from inside the write that is about to use it
    async fn steal_slug_on(pool: &SqlitePool, event: &str, slug: &str) {
        sqlx::query(&format!(
            "CREATE TRIGGER steal_slug BEFORE {event} ON tools WHEN NEW.slug = '{slug}'
             BEGIN
                 INSERT INTO tools (id, name, slug, tagline, description, website_url, tags, status,
                     submitted_by, logo_url, created_at, updated_at)
                 VALUES ('thief-' || NEW.id, 'Thief', NEW.slug, 'x', 'x', 'https://x.io', '[]',
                     'pending', NEW.submitted_by, '', NEW.created_at, NEW.created_at);
             END"
        ))
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_create_retries_slug_taken_at_write_time() {
        let f = fixture().await;
        steal_slug_on(&f.pool, "INSERT", "racy-tool").await;

        let tool = f.tools.create(&f.owner, submission("Racy Tool")).await.unwrap();
        assert_eq!(tool.slug, "racy-tool-1");
        assert_eq!(tool.name, "Racy Tool");
    }

    #[tokio::test]
    async fn test_rename_retries_slug_taken_at_write_time() {
        let f = fixture().await;
        let tool = f.tools.create(&f.owner, submission("Plain")).await.unwrap();
        steal_slug_on(&f.pool, "UPDATE", "copy-wizard").await;

        let renamed = f
            .tools
            .update(
                &f.owner,
                &tool.id,
                ToolUpdate {
                    name: Some("Copy Wizard".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.slug, "copy-wizard-1");
    }

    #[tokio::test]
    async fn test_create_requires_fields() {
        let f = fixture().await;
        let mut tool = submission("Thing");
        tool.website_url = "not a url".to_string();

        assert!(matches!(
            f.tools.create(&f.owner, tool).await,
            Err(MarketError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_pending_tools_are_hidden() {
        let f = fixture().await;
        let tool = f.tools.create(&f.owner, submission("Hidden")).await.unwrap();

        assert!(matches!(
            f.tools.get_public(&tool.id).await,
            Err(MarketError::NotFound(_))
        ));
        assert!(matches!(
            f.tools.get_by_slug(&tool.slug).await,
            Err(MarketError::NotFound(_))
        ));
        assert!(f.tools.list_approved().await.unwrap().is_empty());
        assert_eq!(f.tools.my_tools("owner").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rename_is_visible_in_cached_list() {
        let f = fixture().await;
        let tool = f.tools.create(&f.owner, submission("Old Name")).await.unwrap();
        approve(&f, &tool.id).await;

        // Warm every cache that embeds the tool
        assert_eq!(f.tools.list_approved().await.unwrap()[0].name, "Old Name");
        f.tools.get_public(&tool.id).await.unwrap();
        f.tools.get_by_slug("old-name").await.unwrap();

        let updated = f
            .tools
            .update(
                &f.owner,
                &tool.id,
                ToolUpdate {
                    name: Some("New Name".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.slug, "new-name");

        let names: Vec<String> = f
            .tools
            .list_approved()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["New Name"]);
        assert_eq!(f.tools.get_public(&tool.id).await.unwrap().name, "New Name");
        assert!(f.tools.get_by_slug("old-name").await.is_err());
        assert!(f.tools.get_by_slug("new-name").await.is_ok());
    }

    #[tokio::test]
    async fn test_update_keeps_slug_without_rename() {
        let f = fixture().await;
        let tool = f.tools.create(&f.owner, submission("Stable")).await.unwrap();

        let updated = f
            .tools
            .update(
                &f.owner,
                &tool.id,
                ToolUpdate {
                    tagline: Some("New tagline".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.slug, "stable");
        assert_eq!(updated.tagline, "New tagline");
    }

    #[tokio::test]
    async fn test_only_owner_can_update() {
        let f = fixture().await;
        let tool = f.tools.create(&f.owner, submission("Mine")).await.unwrap();
        let other = add_user(&f.pool, "other").await;

        assert!(matches!(
            f.tools.update(&other, &tool.id, ToolUpdate::default()).await,
            Err(MarketError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_rating_upsert_uses_previous_value() {
        let f = fixture().await;
        let tool = f.tools.create(&f.owner, submission("Rated")).await.unwrap();
        approve(&f, &tool.id).await;
        let rater = add_user(&f.pool, "rater").await;

        f.tools.rate(&rater, &tool.id, 3).await.unwrap();
        let outcome = f.tools.rate(&rater, &tool.id, 5).await.unwrap();

        assert_eq!(outcome.number_of_ratings, 1);
        assert_eq!(outcome.total_rating_sum, 5);
        assert_eq!(outcome.average_rating, 5.0);

        let stored = f.tools.get_public(&tool.id).await.unwrap();
        assert_eq!(stored.rating.average_rating, 5.0);
    }

    #[tokio::test]
    async fn test_average_invariant_over_many_raters() {
        let f = fixture().await;
        let tool = f.tools.create(&f.owner, submission("Popular")).await.unwrap();
        approve(&f, &tool.id).await;

        for (i, rating) in [5, 4, 1, 3].iter().enumerate() {
            let rater = add_user(&f.pool, &format!("r{}", i)).await;
            f.tools.rate(&rater, &tool.id, *rating).await.unwrap();
        }

        let stored = f.tools.require(&tool.id).await.unwrap();
        assert_eq!(stored.rating.number_of_ratings, 4);
        assert_eq!(stored.rating.total_rating_sum, 13);
        assert_eq!(
            stored.rating.average_rating,
            stored.rating.total_rating_sum as f64 / stored.rating.number_of_ratings as f64
        );
    }

    #[tokio::test]
    async fn test_rating_rejects_out_of_range_and_unapproved() {
        let f = fixture().await;
        let tool = f.tools.create(&f.owner, submission("Pending")).await.unwrap();

        assert!(matches!(
            f.tools.rate(&f.owner, &tool.id, 4).await,
            Err(MarketError::NotFound(_))
        ));

        approve(&f, &tool.id).await;
        assert!(matches!(
            f.tools.rate(&f.owner, &tool.id, 6).await,
            Err(MarketError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_search_matches_all_terms() {
        let f = fixture().await;
        let writer = f.tools.create(&f.owner, submission("Copy Writer")).await.unwrap();
        let mut other = submission("Image Studio");
        other.description = "Edit photos".to_string();
        other.tags = vec!["design".to_string()];
        let studio = f.tools.create(&f.owner, other).await.unwrap();
        approve(&f, &writer.id).await;
        approve(&f, &studio.id).await;

        let hits = f.tools.search("WRITER marketing").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, writer.id);

        assert_eq!(f.tools.search("design").await.unwrap()[0].id, studio.id);
        assert!(f.tools.search("writer design").await.unwrap().is_empty());
        assert!(f.tools.search("100%").await.unwrap().is_empty());

        let suggestions = f.tools.suggestions("stu").await.unwrap();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].slug, "image-studio");
    }

    #[tokio::test]
    async fn test_featured_and_ordering() {
        let f = fixture().await;
        let plain = f.tools.create(&f.owner, submission("Plain")).await.unwrap();
        let star = f.tools.create(&f.owner, submission("Star")).await.unwrap();
        approve(&f, &plain.id).await;
        f.tools
            .moderate(
                &star.id,
                ToolModeration {
                    status: Some("approved".to_string()),
                    is_featured: Some(true),
                },
            )
            .await
            .unwrap();

        let all = f.tools.list_approved().await.unwrap();
        assert_eq!(all[0].id, star.id);
        assert_eq!(all.len(), 2);

        let featured = f.tools.featured().await.unwrap();
        assert_eq!(featured.len(), 1);
        assert!(featured[0].is_featured);
    }

    #[tokio::test]
    async fn test_delete_cascades_and_purges_cache() {
        let f = fixture().await;
        let tool = f.tools.create(&f.owner, submission("Doomed")).await.unwrap();
        approve(&f, &tool.id).await;
        let rater = add_user(&f.pool, "rater").await;
        f.tools.rate(&rater, &tool.id, 4).await.unwrap();
        f.tools.get_public(&tool.id).await.unwrap();

        f.tools.delete(&tool.id).await.unwrap();

        let ratings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ratings")
            .fetch_one(&f.pool)
            .await
            .unwrap();
        assert_eq!(ratings, 0);
        assert!(f
            .cache
            .get_json::<Tool>("tool", &keys::tool_by_id(&tool.id))
            .await
            .is_none());
        assert!(matches!(
            f.tools.get_public(&tool.id).await,
            Err(MarketError::NotFound(_))
        ));
    }
}
