/// Denormalized counter maintenance on tool records
///
/// Every function runs as a single statement scoped to the owning row, so
/// callers can compose them inside their own transaction. Counters are
/// incremented in place; media and view groups are recomputed from their
/// source rows.
use crate::db::{self, tool::RatingStats};
use crate::error::{MarketError, MarketResult};
use crate::metrics;
use chrono::{DateTime, Duration, Utc};
use sqlx::{Row, SqliteConnection};

fn rating_stats(row: &sqlx::sqlite::SqliteRow) -> RatingStats {
    RatingStats {
        total_rating_sum: row.get("rating_sum"),
        number_of_ratings: row.get("rating_count"),
        average_rating: row.get("rating_average"),
    }
}

/// Count a user's first rating of a tool
pub async fn rating_added(
    conn: &mut SqliteConnection,
    tool_id: &str,
    rating: i64,
) -> MarketResult<RatingStats> {
    let row = sqlx::query(
        "UPDATE tools SET
             rating_sum = rating_sum + ?2,
             rating_count = rating_count + 1,
             rating_average = CAST(rating_sum + ?2 AS REAL) / (rating_count + 1)
         WHERE id = ?1
         RETURNING rating_sum, rating_count, rating_average",
    )
    .bind(tool_id)
    .bind(rating)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| MarketError::NotFound("Tool not found".to_string()))?;

    metrics::record_aggregate_update("rating");
    Ok(rating_stats(&row))
}

/// Replace a previously counted rating; the count is unchanged
pub async fn rating_changed(
    conn: &mut SqliteConnection,
    tool_id: &str,
    old_rating: i64,
    new_rating: i64,
) -> MarketResult<RatingStats> {
    let row = sqlx::query(
        "UPDATE tools SET
             rating_sum = rating_sum + ?2,
             rating_average = CASE WHEN rating_count > 0
                 THEN CAST(rating_sum + ?2 AS REAL) / rating_count
                 ELSE 0 END
         WHERE id = ?1
         RETURNING rating_sum, rating_count, rating_average",
    )
    .bind(tool_id)
    .bind(new_rating - old_rating)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| MarketError::NotFound("Tool not found".to_string()))?;

    metrics::record_aggregate_update("rating");
    Ok(rating_stats(&row))
}

/// A new approved comment or reply was posted
pub async fn comment_created(
    conn: &mut SqliteConnection,
    tool_id: &str,
    parent_id: Option<&str>,
    at: DateTime<Utc>,
) -> MarketResult<()> {
    sqlx::query(
        "UPDATE tools SET
             total_comments = total_comments + 1,
             approved_comments = approved_comments + 1,
             last_comment_at = ?2
         WHERE id = ?1",
    )
    .bind(tool_id)
    .bind(db::timestamp(at))
    .execute(&mut *conn)
    .await?;

    if let Some(parent_id) = parent_id {
        sqlx::query("UPDATE comments SET reply_count = reply_count + 1 WHERE id = ?1")
            .bind(parent_id)
            .execute(&mut *conn)
            .await?;
    }

    metrics::record_aggregate_update("comment");
    Ok(())
}

/// A comment left the approved state (reported, rejected, pending)
pub async fn comment_left_approved(conn: &mut SqliteConnection, tool_id: &str) -> MarketResult<()> {
    sqlx::query(
        "UPDATE tools SET approved_comments = MAX(approved_comments - 1, 0) WHERE id = ?1",
    )
    .bind(tool_id)
    .execute(&mut *conn)
    .await?;

    metrics::record_aggregate_update("comment");
    Ok(())
}

/// A comment re-entered the approved state
pub async fn comment_entered_approved(
    conn: &mut SqliteConnection,
    tool_id: &str,
) -> MarketResult<()> {
    sqlx::query("UPDATE tools SET approved_comments = approved_comments + 1 WHERE id = ?1")
        .bind(tool_id)
        .execute(&mut *conn)
        .await?;

    metrics::record_aggregate_update("comment");
    Ok(())
}

/// A comment row was removed outright
pub async fn comment_removed(
    conn: &mut SqliteConnection,
    tool_id: &str,
    parent_id: Option<&str>,
    was_approved: bool,
) -> MarketResult<()> {
    sqlx::query(
        "UPDATE tools SET
             total_comments = MAX(total_comments - 1, 0),
             approved_comments = MAX(approved_comments - ?2, 0)
         WHERE id = ?1",
    )
    .bind(tool_id)
    .bind(if was_approved { 1_i64 } else { 0 })
    .execute(&mut *conn)
    .await?;

    if let Some(parent_id) = parent_id {
        sqlx::query("UPDATE comments SET reply_count = MAX(reply_count - 1, 0) WHERE id = ?1")
            .bind(parent_id)
            .execute(&mut *conn)
            .await?;
    }

    metrics::record_aggregate_update("comment");
    Ok(())
}

/// Recompute media stats from active media rows
pub async fn recompute_media(conn: &mut SqliteConnection, tool_id: &str) -> MarketResult<()> {
    sqlx::query(
        "UPDATE tools SET
             total_media = (SELECT COUNT(*) FROM media
                 WHERE tool_id = ?1 AND status = 'active'),
             screenshot_count = (SELECT COUNT(*) FROM media
                 WHERE tool_id = ?1 AND status = 'active' AND category = 'screenshot'),
             video_count = (SELECT COUNT(*) FROM media
                 WHERE tool_id = ?1 AND status = 'active' AND media_type = 'video')
         WHERE id = ?1",
    )
    .bind(tool_id)
    .execute(&mut *conn)
    .await?;

    metrics::record_aggregate_update("media");
    Ok(())
}

/// Recompute view analytics from view events
pub async fn recompute_views(
    conn: &mut SqliteConnection,
    tool_id: &str,
    now: DateTime<Utc>,
) -> MarketResult<()> {
    sqlx::query(
        "UPDATE tools SET
             total_views = (SELECT COUNT(*) FROM tool_views WHERE tool_id = ?1),
             unique_views = (SELECT COUNT(DISTINCT session_id) FROM tool_views WHERE tool_id = ?1),
             weekly_views = (SELECT COUNT(*) FROM tool_views
                 WHERE tool_id = ?1 AND created_at >= ?2),
             monthly_views = (SELECT COUNT(*) FROM tool_views
                 WHERE tool_id = ?1 AND created_at >= ?3),
             last_viewed_at = ?4
         WHERE id = ?1",
    )
    .bind(tool_id)
    .bind(db::timestamp(now - Duration::days(7)))
    .bind(db::timestamp(now - Duration::days(30)))
    .bind(db::timestamp(now))
    .execute(&mut *conn)
    .await?;

    metrics::record_aggregate_update("view");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::SqlitePool;

    async fn setup() -> SqlitePool {
        let pool = db::create_memory_pool().await.unwrap();
        let now = db::timestamp(Utc::now());
        sqlx::query(
            "INSERT INTO users (id, company_name, email, password_hash, created_at, updated_at)
             VALUES ('u1', 'Acme', 'a@example.com', 'x', ?1, ?1)",
        )
        .bind(&now)
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO tools (id, name, slug, tagline, description, website_url, submitted_by, created_at, updated_at)
             VALUES ('t1', 'Tool', 'tool', 't', 'd', 'https://example.com', 'u1', ?1, ?1)",
        )
        .bind(&now)
        .execute(&pool)
        .await
        .unwrap();
        pool
    }

    #[tokio::test]
    async fn test_rating_average_tracks_sum_and_count() {
        let pool = setup().await;
        let mut conn = pool.acquire().await.unwrap();

        let stats = rating_added(&mut conn, "t1", 3).await.unwrap();
        assert_eq!(stats.number_of_ratings, 1);
        assert_eq!(stats.average_rating, 3.0);

        let stats = rating_changed(&mut conn, "t1", 3, 5).await.unwrap();
        assert_eq!(stats.number_of_ratings, 1);
        assert_eq!(stats.total_rating_sum, 5);
        assert_eq!(stats.average_rating, 5.0);

        let stats = rating_added(&mut conn, "t1", 2).await.unwrap();
        assert_eq!(stats.total_rating_sum, 7);
        assert_eq!(stats.average_rating, 3.5);
    }

    #[tokio::test]
    async fn test_rating_on_missing_tool() {
        let pool = setup().await;
        let mut conn = pool.acquire().await.unwrap();

        assert!(matches!(
            rating_added(&mut conn, "nope", 4).await,
            Err(MarketError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_comment_counters_do_not_go_negative() {
        let pool = setup().await;
        let mut conn = pool.acquire().await.unwrap();

        comment_created(&mut conn, "t1", None, Utc::now()).await.unwrap();
        comment_left_approved(&mut conn, "t1").await.unwrap();
        comment_left_approved(&mut conn, "t1").await.unwrap();

        let (total, approved): (i64, i64) =
            sqlx::query_as("SELECT total_comments, approved_comments FROM tools WHERE id = 't1'")
                .fetch_one(&mut *conn)
                .await
                .unwrap();
        assert_eq!((total, approved), (1, 0));
    }
}
