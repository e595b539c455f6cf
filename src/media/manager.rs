/// Media manager using runtime queries
use crate::{
    aggregates,
    auth::AuthUser,
    cache::InvalidationCoordinator,
    db::{
        self,
        media::{Media, MediaCategory, MediaType, MEDIA_COLUMNS},
    },
    error::{MarketError, MarketResult},
    media::{MediaFilter, MediaUpdate, MediaUpload, UploadedFile, MEDIA_FOLDER},
    media_store::MediaStorage,
    metrics,
};
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use tracing::{info, warn};
use validator::Validate;

/// Owner and slug of the tool media hangs off
struct ToolRef {
    slug: String,
    submitted_by: String,
}

/// Media manager service
pub struct MediaManager {
    db: SqlitePool,
    invalidation: InvalidationCoordinator,
    storage: Arc<dyn MediaStorage>,
}

impl MediaManager {
    pub fn new(
        db: SqlitePool,
        invalidation: InvalidationCoordinator,
        storage: Arc<dyn MediaStorage>,
    ) -> Self {
        Self {
            db,
            invalidation,
            storage,
        }
    }

    async fn tool_ref(&self, tool_id: &str) -> MarketResult<ToolRef> {
        let row = sqlx::query("SELECT slug, submitted_by FROM tools WHERE id = ?1")
            .bind(tool_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| MarketError::NotFound("Tool not found".to_string()))?;

        Ok(ToolRef {
            slug: row.get("slug"),
            submitted_by: row.get("submitted_by"),
        })
    }

    /// The tool's owner or an admin may change its media
    async fn authorize(&self, actor: &AuthUser, tool_id: &str) -> MarketResult<ToolRef> {
        let tool = self.tool_ref(tool_id).await?;
        if tool.submitted_by != actor.user_id && !actor.is_admin() {
            return Err(MarketError::Forbidden(
                "Not authorized to manage media for this tool".to_string(),
            ));
        }
        Ok(tool)
    }

    async fn find(&self, tool_id: &str, media_id: &str) -> MarketResult<Media> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM media WHERE id = ?1 AND tool_id = ?2",
            MEDIA_COLUMNS
        ))
        .bind(media_id)
        .bind(tool_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| MarketError::NotFound("Media not found".to_string()))?;

        Media::from_row(&row)
    }

    /// Recompute the tool's media stats and drop cached copies of it
    async fn media_changed(&self, tool_id: &str, slug: &str) -> MarketResult<()> {
        let mut conn = self.db.acquire().await?;
        aggregates::recompute_media(&mut *conn, tool_id).await?;
        drop(conn);

        self.invalidation.media_changed(tool_id, slug).await;
        Ok(())
    }

    /// Active media of a tool, by order then upload time
    pub async fn list(&self, tool_id: &str, filter: &MediaFilter) -> MarketResult<Vec<Media>> {
        let category = filter
            .category
            .as_deref()
            .filter(|c| !c.is_empty())
            .map(MediaCategory::parse)
            .transpose()?;
        let media_type = filter
            .media_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(MediaType::parse)
            .transpose()?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM media
             WHERE tool_id = ?1 AND status = 'active'
               AND (?2 IS NULL OR category = ?2)
               AND (?3 IS NULL OR media_type = ?3)
             ORDER BY sort_order ASC, created_at ASC, rowid ASC",
            MEDIA_COLUMNS
        ))
        .bind(tool_id)
        .bind(category.map(|c| c.as_str()))
        .bind(media_type.map(|t| t.as_str()))
        .fetch_all(&self.db)
        .await?;

        rows.iter().map(Media::from_row).collect()
    }

    /// Store a file and attach it to a tool
    pub async fn upload(
        &self,
        actor: &AuthUser,
        tool_id: &str,
        upload: MediaUpload,
        file: UploadedFile,
    ) -> MarketResult<Media> {
        upload.validate()?;
        let tool = self.authorize(actor, tool_id).await?;

        if file.data.is_empty() {
            return Err(MarketError::Validation("No file uploaded".to_string()));
        }

        let media_type = MediaType::from_content_type(&file.content_type);
        let category = match upload.category.as_deref().filter(|c| !c.is_empty()) {
            Some(c) => MediaCategory::parse(c)
                .map_err(|_| MarketError::Validation("Invalid media category".to_string()))?,
            None => media_type.default_category(),
        };

        let stored = self
            .storage
            .store(file.data, &file.content_type, MEDIA_FOLDER)
            .await?;

        let id = db::new_id();
        let now = db::timestamp(Utc::now());
        let title = upload.title.unwrap_or_default().trim().to_string();
        let description = upload.description.unwrap_or_default().trim().to_string();

        let inserted = sqlx::query(
            "INSERT INTO media (id, tool_id, uploaded_by, media_type, category, url, public_id,
                 thumbnail, title, description, sort_order, file_size, width, height, duration,
                 status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, 'active', ?16, ?16)",
        )
        .bind(&id)
        .bind(tool_id)
        .bind(&actor.user_id)
        .bind(media_type.as_str())
        .bind(category.as_str())
        .bind(&stored.url)
        .bind(&stored.public_id)
        .bind(&stored.thumbnail_url)
        .bind(&title)
        .bind(&description)
        .bind(upload.order.unwrap_or(0))
        .bind(stored.size as i64)
        .bind(stored.width.map(i64::from))
        .bind(stored.height.map(i64::from))
        .bind(stored.duration)
        .bind(&now)
        .execute(&self.db)
        .await;

        if let Err(e) = inserted {
            if let Err(cleanup) = self.storage.delete(&stored.public_id, media_type).await {
                warn!("Failed to remove orphaned media {}: {}", stored.public_id, cleanup);
            }
            return Err(e.into());
        }

        info!("Media {} ({}) attached to tool {}", id, media_type, tool_id);
        metrics::record_media_upload(media_type.as_str());
        self.media_changed(tool_id, &tool.slug).await?;

        self.find(tool_id, &id).await
    }

    /// Edit descriptive fields of a media item
    pub async fn update(
        &self,
        actor: &AuthUser,
        tool_id: &str,
        media_id: &str,
        update: MediaUpdate,
    ) -> MarketResult<Media> {
        update.validate()?;
        let tool = self.authorize(actor, tool_id).await?;
        let existing = self.find(tool_id, media_id).await?;

        let category = update
            .category
            .as_deref()
            .map(MediaCategory::parse)
            .transpose()
            .map_err(|_| MarketError::Validation("Invalid media category".to_string()))?
            .unwrap_or(existing.category);

        let title = update.title.unwrap_or(existing.title).trim().to_string();
        let description = update
            .description
            .unwrap_or(existing.description)
            .trim()
            .to_string();

        sqlx::query(
            "UPDATE media SET title = ?2, description = ?3, sort_order = ?4, category = ?5,
                 updated_at = ?6
             WHERE id = ?1",
        )
        .bind(media_id)
        .bind(&title)
        .bind(&description)
        .bind(update.order.unwrap_or(existing.order))
        .bind(category.as_str())
        .bind(db::timestamp(Utc::now()))
        .execute(&self.db)
        .await?;

        // Category feeds the screenshot count
        self.media_changed(tool_id, &tool.slug).await?;

        self.find(tool_id, media_id).await
    }

    /// Remove a media item; the stored file is deleted best-effort
    pub async fn delete(&self, actor: &AuthUser, tool_id: &str, media_id: &str) -> MarketResult<()> {
        let tool = self.authorize(actor, tool_id).await?;
        let existing = self.find(tool_id, media_id).await?;

        sqlx::query("DELETE FROM media WHERE id = ?1")
            .bind(media_id)
            .execute(&self.db)
            .await?;

        info!("Media {} removed from tool {}", media_id, tool_id);
        self.media_changed(tool_id, &tool.slug).await?;

        if let Err(e) = self
            .storage
            .delete(&existing.public_id, existing.media_type)
            .await
        {
            warn!("Failed to delete stored media {}: {}", existing.public_id, e);
        }
        Ok(())
    }
}
